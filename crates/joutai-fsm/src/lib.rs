//! Append-only, time-ordered state-transition ledger.
//!
//! Every observed state change of a tracked entity becomes one immutable
//! ledger row keyed by a time-sortable id; "current state" is simply the
//! maximum-id row. Around that sit the three registries (models, choices,
//! transitions), declarative transition definitions with validated input
//! fields, an executor that runs one transition end to end, and the state
//! manager that coordinates the ledger with a best-effort cache.
//!
//! # Data flow
//!
//! ```text
//! caller ──▶ StateManager::transition_state_in
//!              └── ledger INSERT (inside the caller's UnitOfWork)
//!              └── UnitOfWork::defer(cache write)
//!                        └── runs strictly after COMMIT, never on rollback
//!
//! caller ──▶ StateManager::get_current_state_value
//!              └── cache hit? return
//!              └── miss: ledger query (ORDER BY id DESC LIMIT 1), backfill
//! ```
//!
//! The one hard rule: the cache may lag committed truth, but may never run
//! ahead of it. Everything else — preconditions, availability filtering,
//! denormalized snapshots — hangs off the registries and the transition
//! trait.
//!
//! # Writers never contend
//!
//! The ledger is insert-only: concurrent writers append rows and never
//! touch existing ones, and id ordering makes "latest" deterministic. No
//! row-level locking, no retries; a failed insert propagates immediately
//! with the entity's cache entry invalidated.

pub mod bootstrap;
pub mod cache;
pub mod db;
pub mod entry;
pub mod error;
pub mod executor;
pub mod fields;
pub mod manager;
pub mod model;
pub mod registry;
pub mod transition;
pub mod uow;

pub use bootstrap::bootstrap;
pub use cache::{MemoryCache, StateCache, cache_key};
pub use db::StateDb;
pub use entry::StateEntry;
pub use error::{NON_FIELD_ERRORS, Result, StateError, TransitionDataError};
pub use executor::{StateCoordinator, TransitionOptions, execute};
pub use fields::{FieldKind, FieldSpec, FieldValues};
pub use manager::StateManager;
pub use model::{StateChoices, StateModel};
pub use registry::StateRegistry;
pub use transition::{Transition, TransitionContext};
pub use uow::UnitOfWork;
