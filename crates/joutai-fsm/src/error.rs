//! Error types for the state ledger.
//!
//! The taxonomy matters to callers: [`StateError::Rejected`] is the one
//! *expected* failure — a transition declaring itself inapplicable — and is
//! filtered silently by availability listings. Everything else is either a
//! configuration mistake (missing registration), malformed transition input
//! ([`TransitionDataError`]), or a storage failure. Nothing in this crate
//! retries; errors surface synchronously to the caller.

use std::collections::BTreeMap;

use thiserror::Error;

/// Reserved key for construction errors that concern the whole input
/// mapping rather than a single field.
pub const NON_FIELD_ERRORS: &str = "_object";

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur during state-ledger operations.
#[derive(Error, Debug)]
pub enum StateError {
    /// No state model registered for the entity's kind.
    #[error("no state model registered for entity kind '{0}'")]
    MissingStateModel(String),

    /// No transition registered under this (kind, name) pair.
    #[error("no transition '{name}' registered for entity kind '{kind}'")]
    MissingTransition { kind: String, name: String },

    /// State value outside the kind's registered closed enumeration.
    #[error("'{state}' is not a valid state for entity kind '{kind}'")]
    UnknownState { kind: String, state: String },

    /// A transition declared itself inapplicable for the current state.
    ///
    /// Expected and silent: availability listings exclude the transition
    /// without logging. Any *other* error from a precondition check is
    /// logged as a warning instead.
    #[error("transition '{transition}' rejected: {reason}")]
    Rejected { transition: String, reason: String },

    /// Malformed transition input data.
    #[error(transparent)]
    InvalidData(#[from] TransitionDataError),

    /// The executor could not carry a transition through to a ledger row.
    #[error("transition '{transition}' failed for {entity}: {source}")]
    TransitionFailed {
        transition: String,
        entity: String,
        source: Box<StateError>,
    },

    /// The state manager reported success=false without an underlying error.
    #[error("state change was not recorded")]
    NotRecorded,

    /// The ledger insert itself failed; the cache entry was invalidated and
    /// no commit hook was registered.
    #[error("could not record state '{state}' for {entity}: {source}")]
    Recording {
        entity: String,
        state: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Any other storage-level failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl StateError {
    /// The validation-rejection a precondition raises to mean "not
    /// applicable from the current state".
    pub fn rejected(transition: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            transition: transition.into(),
            reason: reason.into(),
        }
    }
}

/// Construction failure for a transition's input mapping.
///
/// Carries every field error at once — construction either fully succeeds or
/// reports the complete picture, never a partial application. Errors that
/// concern the whole mapping rather than one field sit under
/// [`NON_FIELD_ERRORS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionDataError {
    /// Name of the transition whose construction failed.
    pub transition: String,
    /// Field name → list of problems with that field.
    pub errors: BTreeMap<String, Vec<String>>,
}

impl TransitionDataError {
    pub fn new(transition: impl Into<String>, errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            transition: transition.into(),
            errors,
        }
    }

    /// A single whole-object error keyed under [`NON_FIELD_ERRORS`].
    pub fn whole_object(transition: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(NON_FIELD_ERRORS.to_string(), vec![message.into()]);
        Self::new(transition, errors)
    }
}

impl std::fmt::Display for TransitionDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid data for transition '{}':", self.transition)?;
        for (field, problems) in &self.errors {
            write!(f, " {}: {};", field, problems.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for TransitionDataError {}
