//! Transition executor: orchestrates one registered transition end to end.
//!
//! The executor deliberately does not know the state manager's type — it
//! works against the [`StateCoordinator`] trait and the caller (in practice
//! the state manager itself) passes the coordinator in. Row creation stays
//! the coordinator's job; the executor owns lookup, input validation,
//! context assembly, and the transition lifecycle.

use std::sync::Arc;

use joutai_types::{EntityRef, StateTracked, UserRef};
use serde_json::{Map, Value};

use crate::entry::StateEntry;
use crate::error::{Result, StateError};
use crate::fields::FieldValues;
use crate::registry::StateRegistry;
use crate::transition::TransitionContext;
use crate::uow::UnitOfWork;

/// Write-path options for recording one transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    /// Name recorded on the row as `transition_name`.
    pub transition_name: Option<String>,
    /// Free-text reason.
    pub reason: String,
    /// The row's `context_data`; `None` means empty.
    pub context: Option<Map<String, Value>>,
}

/// The slice of the state manager the executor needs.
pub trait StateCoordinator {
    /// The entity's current ledger row, absent if it has none.
    fn current_state_entry(&self, entity: &dyn StateTracked) -> Result<Option<StateEntry>>;

    /// Create the ledger row inside the open unit of work and defer the
    /// cache update onto it. `Ok(true)` means the row is in and the
    /// deferred update is registered.
    fn record_transition(
        &self,
        uow: &mut UnitOfWork,
        entity: &dyn StateTracked,
        new_state: &str,
        user: Option<UserRef>,
        opts: TransitionOptions,
    ) -> Result<bool>;
}

/// Run the registered transition `transition_name` for `entity`.
///
/// Fails with a descriptive error if the transition or the state model is
/// unregistered, if `data` fails field validation, or if the coordinator
/// cannot record the row. `finalize` is deferred onto the unit of work so
/// it fires only after the surrounding transaction commits.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    registry: &StateRegistry,
    coordinator: &dyn StateCoordinator,
    uow: &mut UnitOfWork,
    entity: &dyn StateTracked,
    transition_name: &str,
    data: &Map<String, Value>,
    user: Option<UserRef>,
    extra: Map<String, Value>,
) -> Result<StateEntry> {
    let kind = entity.entity_kind();

    let transition =
        registry
            .get_transition(kind, transition_name)
            .ok_or_else(|| StateError::MissingTransition {
                kind: kind.to_string(),
                name: transition_name.to_string(),
            })?;
    if registry.get_model(kind).is_none() {
        return Err(StateError::MissingStateModel(kind.to_string()));
    }

    let values = FieldValues::validate(transition.transition_name(), transition.fields(), data)?;

    let current = coordinator.current_state_entry(entity)?;
    let cx = TransitionContext {
        entity: EntityRef::of(entity),
        user,
        current_state: current.as_ref().map(|e| e.state.clone()),
        current_entry: current,
        target_state: transition.target_state().to_string(),
        organization_id: entity.organization_id(),
        extra,
    };

    let context_data = transition.prepare_and_validate(&cx, &values)?;
    let reason = transition.reason(&cx, &values);
    let entity_label = cx.entity.to_string();

    let recorded = coordinator
        .record_transition(
            uow,
            entity,
            transition.target_state(),
            user,
            TransitionOptions {
                transition_name: Some(transition.transition_name().to_string()),
                reason,
                context: Some(context_data),
            },
        )
        .map_err(|source| StateError::TransitionFailed {
            transition: transition_name.to_string(),
            entity: entity_label.clone(),
            source: Box::new(source),
        })?;
    if !recorded {
        return Err(StateError::TransitionFailed {
            transition: transition_name.to_string(),
            entity: entity_label,
            source: Box::new(StateError::NotRecorded),
        });
    }

    let entry = coordinator
        .current_state_entry(entity)?
        .ok_or_else(|| StateError::TransitionFailed {
            transition: transition_name.to_string(),
            entity: cx.entity.to_string(),
            source: Box::new(StateError::NotRecorded),
        })?;

    // finalize must not fire before the surrounding transaction is durable.
    let finalize_transition = Arc::clone(&transition);
    let finalize_cx = cx;
    let finalize_entry = entry.clone();
    uow.defer(move || {
        finalize_transition.finalize(&finalize_cx, &finalize_entry, &values);
    });

    Ok(entry)
}
