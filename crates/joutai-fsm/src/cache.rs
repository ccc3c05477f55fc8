//! Best-effort current-state cache.
//!
//! The ledger is always the source of truth; the cache only short-circuits
//! the hot "what state is this entity in" read. Staleness and absence are
//! both tolerated — the one property the write path enforces is that the
//! cache is never *ahead* of committed reality (see `uow`).

use dashmap::DashMap;

/// Key-value store for current-state values.
///
/// Implementations are last-writer-wins and may evict at will; failures are
/// swallowed, which is why these methods return nothing.
pub trait StateCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn delete(&self, key: &str);
}

/// Deterministic cache key for an entity — stable across processes.
pub fn cache_key(kind: &str, entity_id: i64) -> String {
    format!("joutai:state:{kind}:{entity_id}")
}

/// In-process cache backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}
