//! The three registries: models, choices, transitions.
//!
//! One constructed [`StateRegistry`] object, shared via `Arc` — never
//! ambient module state. All three maps key on the same explicit
//! `entity_kind` string. Re-registering an existing key overwrites at the
//! data level and logs the overwrite; this is intentional (test isolation,
//! plugin override), not an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{StateChoices, StateModel};
use crate::transition::Transition;

/// Registry of everything known about tracked entity kinds.
#[derive(Default)]
pub struct StateRegistry {
    models: DashMap<String, Arc<StateModel>>,
    choices: DashMap<String, Arc<StateChoices>>,
    transitions: DashMap<String, BTreeMap<String, Arc<dyn Transition>>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Models ──────────────────────────────────────────────────────────

    /// Register the state model for its declared kind.
    pub fn register_model(&self, model: StateModel) {
        let kind = model.entity_kind().to_string();
        if self.models.insert(kind.clone(), Arc::new(model)).is_some() {
            tracing::info!(kind = %kind, "replacing registered state model");
        } else {
            tracing::debug!(kind = %kind, "registered state model");
        }
    }

    pub fn get_model(&self, kind: &str) -> Option<Arc<StateModel>> {
        self.models.get(kind).map(|m| m.value().clone())
    }

    // ── Choices ─────────────────────────────────────────────────────────

    /// Register the closed state enumeration for a kind.
    pub fn register_choices(&self, kind: &str, choices: StateChoices) {
        if self
            .choices
            .insert(kind.to_string(), Arc::new(choices))
            .is_some()
        {
            tracing::info!(kind = %kind, "replacing registered state choices");
        } else {
            tracing::debug!(kind = %kind, "registered state choices");
        }
    }

    pub fn get_choices(&self, kind: &str) -> Option<Arc<StateChoices>> {
        self.choices.get(kind).map(|c| c.value().clone())
    }

    // ── Transitions ─────────────────────────────────────────────────────

    /// Register a transition under its own name for a kind.
    pub fn register_transition(&self, kind: &str, transition: Arc<dyn Transition>) {
        let name = transition.transition_name().to_string();
        let replaced = self
            .transitions
            .entry(kind.to_string())
            .or_default()
            .insert(name.clone(), transition)
            .is_some();
        if replaced {
            tracing::info!(kind = %kind, transition = %name, "replacing registered transition");
        } else {
            tracing::debug!(kind = %kind, transition = %name, "registered transition");
        }
    }

    pub fn get_transition(&self, kind: &str, name: &str) -> Option<Arc<dyn Transition>> {
        self.transitions
            .get(kind)
            .and_then(|map| map.value().get(name).cloned())
    }

    /// Every transition registered for a kind, name-ordered. Empty mapping
    /// if none are registered.
    pub fn transitions_for(&self, kind: &str) -> BTreeMap<String, Arc<dyn Transition>> {
        self.transitions
            .get(kind)
            .map(|map| map.value().clone())
            .unwrap_or_default()
    }

    /// Empty all three registries. Test teardown only.
    pub fn clear(&self) {
        self.models.clear();
        self.choices.clear();
        self.transitions.clear();
    }
}

impl std::fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRegistry")
            .field("models", &self.models.len())
            .field("choices", &self.choices.len())
            .field("transition_kinds", &self.transitions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionContext;
    use crate::error::Result;
    use joutai_types::TaskState;

    struct Named(&'static str, &'static str);

    impl Transition for Named {
        fn transition_name(&self) -> &str {
            self.0
        }

        fn target_state(&self) -> &str {
            self.1
        }

        fn can_transition_from_state(&self, _cx: &TransitionContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_overwrite_replaces_without_error() {
        let registry = StateRegistry::new();
        registry.register_model(StateModel::new("task").with_terminal("COMPLETED"));
        registry.register_model(StateModel::new("task").with_terminal("IN_PROGRESS"));
        assert_eq!(
            registry.get_model("task").unwrap().terminal_state(),
            Some("IN_PROGRESS")
        );
    }

    #[test]
    fn test_missing_keys_return_none() {
        let registry = StateRegistry::new();
        assert!(registry.get_model("nothing").is_none());
        assert!(registry.get_choices("nothing").is_none());
        assert!(registry.get_transition("nothing", "go").is_none());
        assert!(registry.transitions_for("nothing").is_empty());
    }

    #[test]
    fn test_transitions_are_listed_per_kind() {
        let registry = StateRegistry::new();
        registry.register_transition("task", Arc::new(Named("start", "IN_PROGRESS")));
        registry.register_transition("task", Arc::new(Named("complete", "COMPLETED")));
        registry.register_transition("project", Arc::new(Named("archive", "ARCHIVED")));

        let names: Vec<String> = registry.transitions_for("task").into_keys().collect();
        assert_eq!(names, vec!["complete".to_string(), "start".to_string()]);
        assert!(registry.get_transition("project", "archive").is_some());
        assert!(registry.get_transition("project", "start").is_none());
    }

    #[test]
    fn test_clear_empties_everything() {
        let registry = StateRegistry::new();
        registry.register_model(StateModel::new("task"));
        registry.register_choices("task", StateChoices::of::<TaskState>());
        registry.register_transition("task", Arc::new(Named("start", "IN_PROGRESS")));

        registry.clear();
        assert!(registry.get_model("task").is_none());
        assert!(registry.get_choices("task").is_none());
        assert!(registry.transitions_for("task").is_empty());
    }
}
