//! The ledger entry: one immutable observed state transition.

use joutai_types::{EntityRef, StateId, UserRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the append-only state ledger.
///
/// Rows are created exactly once per transition and never mutated or deleted
/// in normal operation; "current state" is the row with the maximum [`id`]
/// for a given entity. `created_at` is informational only — ordering
/// authority is the id.
///
/// [`id`]: StateEntry::id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Time-sortable primary key, assigned at creation.
    pub id: StateId,
    /// Registry key of the tracked entity's kind.
    pub entity_kind: String,
    /// Tracked entity's integer identifier.
    pub entity_id: i64,
    /// Tenant scope, when the entity carries one.
    pub organization_id: Option<i64>,
    /// Observed state value.
    pub state: String,
    /// State of the previous ledger row for this entity; `None` on the very
    /// first transition.
    pub previous_state: Option<String>,
    /// Which registered transition produced this row, if any.
    pub transition_name: Option<String>,
    /// Acting identity, stored opaquely.
    pub triggered_by: Option<UserRef>,
    /// Open key-value payload supplied by the transition.
    #[serde(default)]
    pub context_data: Map<String, Value>,
    /// Scalars snapshotted from the entity at transition time.
    #[serde(default)]
    pub denormalized: Map<String, Value>,
    /// Free-text reason.
    #[serde(default)]
    pub reason: String,
    /// Wall-clock unix millis at creation. Informational.
    pub created_at: i64,
}

impl StateEntry {
    /// Identity snapshot of the entity this row tracks.
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            kind: self.entity_kind.clone(),
            id: self.entity_id,
            organization_id: self.organization_id,
        }
    }
}
