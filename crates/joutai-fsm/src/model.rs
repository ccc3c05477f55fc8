//! Per-kind state models: the data that used to be a type.
//!
//! A [`StateModel`] declares everything the ledger needs to know about one
//! entity kind: its registry key, its designated terminal state, and how to
//! snapshot denormalized scalars off the entity at transition time. The kind
//! key is an explicit field rather than something derived from a type name.

use joutai_types::StateTracked;
use serde_json::{Map, Value};

type DenormalizeFn = Box<dyn Fn(&dyn StateTracked) -> Map<String, Value> + Send + Sync>;

/// Descriptor for one tracked entity kind.
pub struct StateModel {
    entity_kind: String,
    terminal_state: Option<String>,
    denormalize: Option<DenormalizeFn>,
}

impl StateModel {
    pub fn new(entity_kind: impl Into<String>) -> Self {
        Self {
            entity_kind: entity_kind.into(),
            terminal_state: None,
            denormalize: None,
        }
    }

    /// Designate the state from which no further transitions are expected.
    pub fn with_terminal(mut self, state: impl Into<String>) -> Self {
        self.terminal_state = Some(state.into());
        self
    }

    /// Provide the denormalized-snapshot hook for this kind.
    pub fn with_denormalize(
        mut self,
        f: impl Fn(&dyn StateTracked) -> Map<String, Value> + Send + Sync + 'static,
    ) -> Self {
        self.denormalize = Some(Box::new(f));
        self
    }

    pub fn entity_kind(&self) -> &str {
        &self.entity_kind
    }

    pub fn terminal_state(&self) -> Option<&str> {
        self.terminal_state.as_deref()
    }

    /// Whether `state` is this kind's designated terminal value.
    pub fn is_terminal(&self, state: &str) -> bool {
        self.terminal_state.as_deref() == Some(state)
    }

    /// Scalars to copy onto a new ledger row for `entity`.
    ///
    /// Defaults to an empty mapping — "no denormalization" is a valid
    /// choice, not an oversight.
    pub fn denormalized_fields(&self, entity: &dyn StateTracked) -> Map<String, Value> {
        match &self.denormalize {
            Some(f) => f(entity),
            None => Map::new(),
        }
    }
}

impl std::fmt::Debug for StateModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateModel")
            .field("entity_kind", &self.entity_kind)
            .field("terminal_state", &self.terminal_state)
            .field("denormalize", &self.denormalize.is_some())
            .finish()
    }
}

/// Closed enumeration of the state values valid for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChoices {
    values: Vec<String>,
}

impl StateChoices {
    pub fn new<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a strum-iterable state enum.
    pub fn of<T>() -> Self
    where
        T: strum::IntoEnumIterator,
        &'static str: From<T>,
    {
        Self::new(T::iter().map(<&'static str>::from))
    }

    pub fn contains(&self, state: &str) -> bool {
        self.values.iter().any(|v| v == state)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joutai_types::{EntityRef, TaskState};
    use serde_json::json;

    #[test]
    fn test_terminal_predicate() {
        let model = StateModel::new("task").with_terminal(TaskState::Completed.as_str());
        assert!(model.is_terminal("COMPLETED"));
        assert!(!model.is_terminal("CREATED"));

        let bare = StateModel::new("note");
        assert!(!bare.is_terminal("ANYTHING"));
    }

    #[test]
    fn test_denormalize_defaults_to_empty() {
        let model = StateModel::new("project");
        let entity = EntityRef::new("project", 1);
        assert!(model.denormalized_fields(&entity).is_empty());
    }

    #[test]
    fn test_denormalize_hook_runs() {
        let model = StateModel::new("task").with_denormalize(|e| {
            let mut map = Map::new();
            map.insert("entity_id".to_string(), json!(e.entity_id()));
            map
        });
        let entity = EntityRef::new("task", 42);
        assert_eq!(model.denormalized_fields(&entity)["entity_id"], json!(42));
    }

    #[test]
    fn test_choices_from_enum() {
        let choices = StateChoices::of::<TaskState>();
        assert!(choices.contains("IN_PROGRESS"));
        assert!(!choices.contains("in_progress"));
        assert_eq!(choices.values().len(), 3);
    }
}
