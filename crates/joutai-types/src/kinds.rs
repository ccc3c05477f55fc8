//! Closed state enumerations for the built-in entity kinds.
//!
//! Wire form is SCREAMING_SNAKE_CASE, matching what lands in the ledger's
//! `state` column. The enums are the source of truth for each kind's choice
//! registration; the terminal designation lives with the registered state
//! model, not here.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// States a labeling task moves through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Created,
    InProgress,
    Completed,
}

/// States of a single annotation on a task.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationState {
    Draft,
    Submitted,
    Updated,
    Discarded,
}

/// Project lifecycle states.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    Created,
    InProgress,
    Completed,
    Archived,
}

macro_rules! impl_as_str {
    ($T:ident) => {
        impl $T {
            /// The stable wire form stored in the ledger's `state` column.
            pub fn as_str(self) -> &'static str {
                self.into()
            }
        }
    };
}

impl_as_str!(TaskState);
impl_as_str!(AnnotationState);
impl_as_str!(ProjectState);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_wire_form_is_screaming_snake() {
        assert_eq!(TaskState::InProgress.as_str(), "IN_PROGRESS");
        assert_eq!(AnnotationState::Draft.as_str(), "DRAFT");
        assert_eq!(ProjectState::Archived.as_str(), "ARCHIVED");
    }

    #[test]
    fn test_from_str_roundtrip() {
        for state in TaskState::iter() {
            assert_eq!(TaskState::from_str(state.as_str()).unwrap(), state);
        }
        assert!(TaskState::from_str("NOT_A_STATE").is_err());
    }

    #[test]
    fn test_serde_matches_strum() {
        let json = serde_json::to_string(&AnnotationState::Submitted).unwrap();
        assert_eq!(json, "\"SUBMITTED\"");
        let back: AnnotationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AnnotationState::Submitted);
    }
}
