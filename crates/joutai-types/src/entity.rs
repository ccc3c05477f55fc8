//! Contracts for tracked entities and acting users.
//!
//! The ledger never owns the objects it tracks. Anything with an integer
//! primary identifier and a kind name can be tracked; the surrounding
//! application implements [`StateTracked`] on its own records (tasks,
//! annotations, projects, …) and hands references across the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An addressable record whose state transitions are recorded in the ledger.
pub trait StateTracked {
    /// The entity-kind key all three registries share, e.g. `"task"`.
    fn entity_kind(&self) -> &str;

    /// Integer primary identifier within the kind.
    fn entity_id(&self) -> i64;

    /// Owning tenant, if the entity is organization-scoped.
    fn organization_id(&self) -> Option<i64> {
        None
    }

    /// Named scalar lookup for denormalized snapshots.
    ///
    /// State models read entity attributes through this (e.g. a task's
    /// `project_id`) so they can copy them onto new ledger rows. `None`
    /// means the attribute does not exist on this entity.
    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// A plain value snapshot of an entity's ledger-relevant identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: i64,
    pub organization_id: Option<i64>,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
            organization_id: None,
        }
    }

    pub fn with_organization(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    /// Snapshot any tracked entity.
    pub fn of(entity: &dyn StateTracked) -> Self {
        Self {
            kind: entity.entity_kind().to_string(),
            id: entity.entity_id(),
            organization_id: entity.organization_id(),
        }
    }
}

impl StateTracked for EntityRef {
    fn entity_kind(&self) -> &str {
        &self.kind
    }

    fn entity_id(&self) -> i64 {
        self.id
    }

    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Opaque reference to the identity that triggered a transition.
///
/// No permission logic lives in the ledger; this is stored verbatim on the
/// row as `triggered_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub i64);

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}
