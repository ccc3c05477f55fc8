//! The state manager: cache-coordinated reads and the single write path.
//!
//! # Read path
//!
//! `get_current_state_value` is cache-first; a miss falls back to the
//! ledger and backfills the cache. The cache is best-effort — correctness
//! never depends on it being present, only on it never being ahead of
//! committed truth.
//!
//! # Write path
//!
//! `transition_state_in` inserts the new ledger row inside the caller's
//! open [`UnitOfWork`] and *defers* the cache write onto it, so the cache
//! updates strictly after commit and never on rollback. Any failure before
//! that point deletes the cache entry outright: a reader may pay an extra
//! ledger query, but can never observe a state that was not committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use joutai_types::{IdGenerator, StateId, StateTracked, SystemIdGenerator, UserRef};
use serde_json::Map;

use crate::cache::{MemoryCache, StateCache, cache_key};
use crate::db::StateDb;
use crate::entry::StateEntry;
use crate::error::{Result, StateError};
use crate::executor::{self, StateCoordinator, TransitionOptions};
use crate::model::StateModel;
use crate::registry::StateRegistry;
use crate::transition::{Transition, TransitionContext};
use crate::uow::UnitOfWork;

/// Coordinates the ledger, the cache, and the registries.
pub struct StateManager {
    db: StateDb,
    cache: Arc<dyn StateCache>,
    registry: Arc<StateRegistry>,
    ids: Arc<dyn IdGenerator>,
}

impl StateManager {
    /// Manager with an in-process cache and the wall-clock id generator.
    pub fn new(db: StateDb, registry: Arc<StateRegistry>) -> Self {
        Self {
            db,
            cache: Arc::new(MemoryCache::new()),
            registry,
            ids: Arc::new(SystemIdGenerator::new()),
        }
    }

    /// Swap in a shared cache backend.
    pub fn with_cache(mut self, cache: Arc<dyn StateCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Swap in an id source (deterministic generators for tests).
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn registry(&self) -> &Arc<StateRegistry> {
        &self.registry
    }

    /// Open a unit of work on the ledger.
    pub fn begin_unit(&self) -> Result<UnitOfWork> {
        Ok(UnitOfWork::begin(&self.db)?)
    }

    /// Deterministic cache key for an entity — stable across processes.
    pub fn get_cache_key(&self, entity: &dyn StateTracked) -> String {
        cache_key(entity.entity_kind(), entity.entity_id())
    }

    fn require_model(&self, kind: &str) -> Result<Arc<StateModel>> {
        self.registry
            .get_model(kind)
            .ok_or_else(|| StateError::MissingStateModel(kind.to_string()))
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Current state value, cache-first; `None` if the entity has no
    /// ledger rows yet.
    pub fn get_current_state_value(&self, entity: &dyn StateTracked) -> Result<Option<String>> {
        let kind = entity.entity_kind();
        self.require_model(kind)?;

        let key = self.get_cache_key(entity);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached));
        }

        match self.db.current_entry(kind, entity.entity_id())? {
            Some(found) => {
                self.cache.set(&key, &found.state);
                Ok(Some(found.state))
            }
            None => Ok(None),
        }
    }

    /// Current full ledger row, straight from the ledger.
    pub fn get_current_state_object(
        &self,
        entity: &dyn StateTracked,
    ) -> Result<Option<StateEntry>> {
        self.require_model(entity.entity_kind())?;
        Ok(self.db.current_entry(entity.entity_kind(), entity.entity_id())?)
    }

    /// Ledger rows for the entity, newest first, capped at `limit`.
    pub fn get_state_history(
        &self,
        entity: &dyn StateTracked,
        limit: usize,
    ) -> Result<Vec<StateEntry>> {
        self.require_model(entity.entity_kind())?;
        Ok(self
            .db
            .history(entity.entity_kind(), entity.entity_id(), limit)?)
    }

    /// Rows created within `[start, end]`, oldest first, via the id-range
    /// technique — no timestamp comparison involved.
    pub fn get_states_in_time_range(
        &self,
        entity: &dyn StateTracked,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StateEntry>> {
        self.require_model(entity.entity_kind())?;
        let (low, high) = StateId::time_range(start, Some(end));
        Ok(self.db.entries_in_id_range(
            entity.entity_kind(),
            entity.entity_id(),
            &low,
            &high,
        )?)
    }

    /// Rows created since `since`, oldest first.
    pub fn get_states_since(
        &self,
        entity: &dyn StateTracked,
        since: DateTime<Utc>,
    ) -> Result<Vec<StateEntry>> {
        self.get_states_in_time_range(entity, since, Utc::now())
    }

    /// Whether the entity currently sits in its kind's terminal state.
    pub fn is_in_terminal_state(&self, entity: &dyn StateTracked) -> Result<bool> {
        let model = self.require_model(entity.entity_kind())?;
        Ok(self
            .get_current_state_value(entity)?
            .is_some_and(|state| model.is_terminal(&state)))
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Record a transition inside the caller's open unit of work.
    ///
    /// Returns `Ok(true)` only when the row is inserted and the cache
    /// write is deferred onto `uow`. On any failure the cache entry for
    /// this entity is deleted, nothing is deferred, and the error
    /// propagates.
    pub fn transition_state_in(
        &self,
        uow: &mut UnitOfWork,
        entity: &dyn StateTracked,
        new_state: &str,
        user: Option<UserRef>,
        opts: TransitionOptions,
    ) -> Result<bool> {
        let key = self.get_cache_key(entity);
        match self.record(entity, new_state, user, opts) {
            Ok(entry) => {
                let cache = Arc::clone(&self.cache);
                let state = entry.state.clone();
                uow.defer(move || cache.set(&key, &state));
                tracing::debug!(
                    entity = %entry.entity_ref(),
                    state = %entry.state,
                    previous = entry.previous_state.as_deref().unwrap_or("-"),
                    id = %entry.id,
                    "state transition recorded"
                );
                Ok(true)
            }
            Err(e) => {
                // Stale reads must be impossible after a failed write.
                self.cache.delete(&key);
                Err(e)
            }
        }
    }

    /// One-shot convenience: open a unit of work, record, commit.
    pub fn transition_state(
        &self,
        entity: &dyn StateTracked,
        new_state: &str,
        user: Option<UserRef>,
        opts: TransitionOptions,
    ) -> Result<bool> {
        let mut uow = self.begin_unit()?;
        let ok = self.transition_state_in(&mut uow, entity, new_state, user, opts)?;
        uow.commit()?;
        Ok(ok)
    }

    fn record(
        &self,
        entity: &dyn StateTracked,
        new_state: &str,
        user: Option<UserRef>,
        opts: TransitionOptions,
    ) -> Result<StateEntry> {
        let kind = entity.entity_kind();
        let model = self.require_model(kind)?;

        if let Some(choices) = self.registry.get_choices(kind)
            && !choices.contains(new_state)
        {
            return Err(StateError::UnknownState {
                kind: kind.to_string(),
                state: new_state.to_string(),
            });
        }

        let previous_state = self
            .db
            .current_entry(kind, entity.entity_id())?
            .map(|e| e.state);

        let entry = StateEntry {
            id: self.ids.generate(),
            entity_kind: kind.to_string(),
            entity_id: entity.entity_id(),
            organization_id: entity.organization_id(),
            state: new_state.to_string(),
            previous_state,
            transition_name: opts.transition_name,
            triggered_by: user,
            context_data: opts.context.unwrap_or_default(),
            denormalized: model.denormalized_fields(entity),
            reason: opts.reason,
            created_at: Utc::now().timestamp_millis(),
        };

        self.db.insert(&entry).map_err(|source| StateError::Recording {
            entity: entry.entity_ref().to_string(),
            state: new_state.to_string(),
            source,
        })?;
        Ok(entry)
    }

    // ── Registered transitions ──────────────────────────────────────────

    /// Run a registered transition inside the caller's unit of work.
    pub fn execute_transition_in(
        &self,
        uow: &mut UnitOfWork,
        entity: &dyn StateTracked,
        transition_name: &str,
        data: &Map<String, serde_json::Value>,
        user: Option<UserRef>,
        extra: Map<String, serde_json::Value>,
    ) -> Result<StateEntry> {
        executor::execute(
            &self.registry,
            self,
            uow,
            entity,
            transition_name,
            data,
            user,
            extra,
        )
    }

    /// One-shot convenience around [`Self::execute_transition_in`].
    pub fn execute_transition(
        &self,
        entity: &dyn StateTracked,
        transition_name: &str,
        data: &Map<String, serde_json::Value>,
        user: Option<UserRef>,
        extra: Map<String, serde_json::Value>,
    ) -> Result<StateEntry> {
        let mut uow = self.begin_unit()?;
        let entry =
            self.execute_transition_in(&mut uow, entity, transition_name, data, user, extra)?;
        uow.commit()?;
        Ok(entry)
    }

    /// Transitions registered for the entity's kind, name-ordered.
    ///
    /// With `validate`, each transition's precondition is consulted against
    /// the entity's current state: a validation-rejection excludes it
    /// silently; any other error excludes it with a warning.
    pub fn get_available_transitions(
        &self,
        entity: &dyn StateTracked,
        validate: bool,
    ) -> Result<Vec<Arc<dyn Transition>>> {
        let kind = entity.entity_kind();
        let transitions = self.registry.transitions_for(kind);
        if !validate {
            return Ok(transitions.into_values().collect());
        }

        let current = self.get_current_state_object(entity)?;
        let mut available = Vec::new();
        for (name, transition) in transitions {
            let cx = TransitionContext {
                entity: joutai_types::EntityRef::of(entity),
                user: None,
                current_state: current.as_ref().map(|e| e.state.clone()),
                current_entry: current.clone(),
                target_state: transition.target_state().to_string(),
                organization_id: entity.organization_id(),
                extra: Map::new(),
            };
            match transition.can_transition_from_state(&cx) {
                Ok(()) => available.push(transition),
                Err(StateError::Rejected { .. }) => {}
                Err(e) => {
                    tracing::warn!(
                        kind = %kind,
                        transition = %name,
                        error = %e,
                        "transition availability check failed"
                    );
                }
            }
        }
        Ok(available)
    }
}

impl StateCoordinator for StateManager {
    fn current_state_entry(&self, entity: &dyn StateTracked) -> Result<Option<StateEntry>> {
        self.get_current_state_object(entity)
    }

    fn record_transition(
        &self,
        uow: &mut UnitOfWork,
        entity: &dyn StateTracked,
        new_state: &str,
        user: Option<UserRef>,
        opts: TransitionOptions,
    ) -> Result<bool> {
        self.transition_state_in(uow, entity, new_state, user, opts)
    }
}
