//! Shared identifier and state types for Joutai.
//!
//! This crate is the leaf of the workspace: time-sortable ledger ids, the
//! tracked-entity contract, and the built-in state enumerations. It has **no
//! internal joutai dependencies** — the FSM core builds on it.
//!
//! # Identity model
//!
//! ```text
//! StateId (UUIDv7) ← one per ledger entry, primary key AND ordering key
//!     └── embeds unix millis in the top 48 bits
//!     └── produced by SystemIdGenerator (wall clock, strictly increasing)
//!         or FixedBaseIdGenerator (deterministic, tests)
//!
//! StateTracked ← anything the ledger follows (task, annotation, project, …)
//!     └── entity_kind() + entity_id() address it in every registry
//!     └── attr() exposes scalars for denormalized snapshots
//!
//! UserRef ← opaque identity stored as triggered_by
//! ```

pub mod entity;
pub mod kinds;
pub mod tsid;

pub use entity::{EntityRef, StateTracked, UserRef};
pub use kinds::{AnnotationState, ProjectState, TaskState};
pub use tsid::{FixedBaseIdGenerator, IdGenerator, RANGE_BUFFER_MS, StateId, SystemIdGenerator};
