//! Transition definitions and their execution context.
//!
//! A transition is a declarative description of one state change: the fixed
//! target state, the typed input fields it needs, an optional precondition,
//! and lifecycle hooks around the ledger write. Implementations are
//! registered as `Arc<dyn Transition>` and stay stateless — per-invocation
//! input arrives as validated [`FieldValues`].

use joutai_types::{EntityRef, UserRef};
use serde_json::{Map, Value};

use crate::entry::StateEntry;
use crate::error::Result;
use crate::fields::{FieldSpec, FieldValues};

/// Ephemeral, immutable bundle passed through a transition's lifecycle.
///
/// Never persisted as-is; whatever `prepare_and_validate` returns is what
/// lands in the new row's `context_data`.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    /// The entity being transitioned.
    pub entity: EntityRef,
    /// Acting identity, if any.
    pub user: Option<UserRef>,
    /// The entity's current ledger row, absent before the first transition.
    pub current_entry: Option<StateEntry>,
    /// Just the current state value.
    pub current_state: Option<String>,
    /// The transition's declared destination.
    pub target_state: String,
    /// Tenant scope carried from the entity.
    pub organization_id: Option<i64>,
    /// Caller-supplied extra context, available to hooks.
    pub extra: Map<String, Value>,
}

/// One named, declarative state change.
pub trait Transition: Send + Sync {
    /// Stable identifier, recorded on the ledger row as `transition_name`.
    fn transition_name(&self) -> &str;

    /// The state this transition moves the entity to.
    fn target_state(&self) -> &str;

    /// Declared, validated input fields. Default: none.
    fn fields(&self) -> &[FieldSpec] {
        &[]
    }

    /// Precondition: can this transition apply given the current state?
    ///
    /// Return [`crate::StateError::rejected`] to mean "inapplicable —
    /// exclude silently". Any other error is treated as unexpected: logged
    /// as a warning by availability listings and likewise excluded.
    fn can_transition_from_state(&self, _cx: &TransitionContext) -> Result<()> {
        Ok(())
    }

    /// Pre-commit hook; the returned mapping becomes the row's
    /// `context_data`. Default: the transition's own validated field values.
    fn prepare_and_validate(
        &self,
        _cx: &TransitionContext,
        values: &FieldValues,
    ) -> Result<Map<String, Value>> {
        Ok(values.to_context())
    }

    /// Human-readable reason recorded on the row. Default: empty.
    fn reason(&self, _cx: &TransitionContext, _values: &FieldValues) -> String {
        String::new()
    }

    /// Post-commit hook, invoked with the created row once the transition
    /// is durably recorded. Default: no-op.
    fn finalize(&self, _cx: &TransitionContext, _entry: &StateEntry, _values: &FieldValues) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use serde_json::json;

    struct Promote;

    impl Transition for Promote {
        fn transition_name(&self) -> &str {
            "promote"
        }

        fn target_state(&self) -> &str {
            "ACTIVE"
        }

        fn can_transition_from_state(&self, cx: &TransitionContext) -> Result<()> {
            match cx.current_state.as_deref() {
                Some("ACTIVE") => Err(StateError::rejected("promote", "already active")),
                _ => Ok(()),
            }
        }
    }

    fn context(current: Option<&str>) -> TransitionContext {
        TransitionContext {
            entity: EntityRef::new("task", 1),
            user: None,
            current_entry: None,
            current_state: current.map(String::from),
            target_state: "ACTIVE".to_string(),
            organization_id: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_default_context_data_is_field_values() {
        let values = FieldValues::validate(
            "promote",
            &[FieldSpec::text("note")],
            json!({"note": "hi"}).as_object().unwrap(),
        )
        .unwrap();
        let out = Promote.prepare_and_validate(&context(None), &values).unwrap();
        assert_eq!(out["note"], json!("hi"));
    }

    #[test]
    fn test_precondition_rejects_from_target_state() {
        assert!(Promote.can_transition_from_state(&context(None)).is_ok());
        assert!(matches!(
            Promote.can_transition_from_state(&context(Some("ACTIVE"))),
            Err(StateError::Rejected { .. })
        ));
    }
}
