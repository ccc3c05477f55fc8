//! SQLite persistence for the state ledger.
//!
//! One append-only table. The `id` column stores the TSID as 32-char
//! lowercase hex, so TEXT ordering equals unsigned integer ordering and
//! every "current state" / range query orders purely by primary key — no
//! timestamp index exists. There are no UPDATE or DELETE paths here at all.

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};
use std::path::Path;
use std::sync::Arc;

use joutai_types::{StateId, UserRef};
use serde_json::{Map, Value};

use crate::entry::StateEntry;

const SCHEMA: &str = r#"
-- State ledger (append-only, immutable)
CREATE TABLE IF NOT EXISTS state_entries (
    id TEXT PRIMARY KEY,
    entity_kind TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    organization_id INTEGER,
    state TEXT NOT NULL CHECK (length(state) > 0),
    previous_state TEXT,
    transition_name TEXT,
    triggered_by INTEGER,
    context_data TEXT NOT NULL DEFAULT '{}',
    denormalized TEXT NOT NULL DEFAULT '{}',
    reason TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_state_entries_entity ON state_entries(entity_kind, entity_id, id);
CREATE INDEX IF NOT EXISTS idx_state_entries_org ON state_entries(organization_id);
CREATE INDEX IF NOT EXISTS idx_state_entries_state ON state_entries(state);
"#;

const COLUMNS: &str = "id, entity_kind, entity_id, organization_id, state, previous_state, \
                       transition_name, triggered_by, context_data, denormalized, reason, created_at";

/// Handle to the ledger database. Cheap to clone; all clones share one
/// connection, so reads inside an open unit of work observe its writes.
#[derive(Clone)]
pub struct StateDb {
    conn: Arc<Mutex<Connection>>,
}

impl StateDb {
    /// Open or create a ledger database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory ledger (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Append one ledger row.
    pub fn insert(&self, entry: &StateEntry) -> SqliteResult<()> {
        self.conn.lock().execute(
            "INSERT INTO state_entries (id, entity_kind, entity_id, organization_id, state, \
             previous_state, transition_name, triggered_by, context_data, denormalized, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entry.id.to_hex(),
                entry.entity_kind,
                entry.entity_id,
                entry.organization_id,
                entry.state,
                entry.previous_state,
                entry.transition_name,
                entry.triggered_by.map(|u| u.0),
                Value::Object(entry.context_data.clone()).to_string(),
                Value::Object(entry.denormalized.clone()).to_string(),
                entry.reason,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    /// The maximum-id row for an entity, or `None` if it has no ledger rows.
    pub fn current_entry(&self, kind: &str, entity_id: i64) -> SqliteResult<Option<StateEntry>> {
        self.conn
            .lock()
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM state_entries
                     WHERE entity_kind = ?1 AND entity_id = ?2
                     ORDER BY id DESC LIMIT 1"
                ),
                params![kind, entity_id],
                row_to_entry,
            )
            .optional()
    }

    /// Ledger rows for an entity, newest first, capped at `limit`.
    pub fn history(&self, kind: &str, entity_id: i64, limit: usize) -> SqliteResult<Vec<StateEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM state_entries
             WHERE entity_kind = ?1 AND entity_id = ?2
             ORDER BY id DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![kind, entity_id, limit as i64], row_to_entry)?;
        rows.collect()
    }

    /// Rows whose ids fall inside `[low, high]`, oldest first.
    ///
    /// Callers build the bounds with [`StateId::time_range`]; the query
    /// itself never touches `created_at`.
    pub fn entries_in_id_range(
        &self,
        kind: &str,
        entity_id: i64,
        low: &StateId,
        high: &StateId,
    ) -> SqliteResult<Vec<StateEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM state_entries
             WHERE entity_kind = ?1 AND entity_id = ?2 AND id >= ?3 AND id <= ?4
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(
            params![kind, entity_id, low.to_hex(), high.to_hex()],
            row_to_entry,
        )?;
        rows.collect()
    }

    /// Total row count for an entity.
    pub fn count_for_entity(&self, kind: &str, entity_id: i64) -> SqliteResult<i64> {
        self.conn.lock().query_row(
            "SELECT COUNT(*) FROM state_entries WHERE entity_kind = ?1 AND entity_id = ?2",
            params![kind, entity_id],
            |row| row.get(0),
        )
    }

    pub(crate) fn begin_immediate(&self) -> SqliteResult<()> {
        self.conn.lock().execute_batch("BEGIN IMMEDIATE")
    }

    pub(crate) fn commit(&self) -> SqliteResult<()> {
        self.conn.lock().execute_batch("COMMIT")
    }

    pub(crate) fn rollback(&self) -> SqliteResult<()> {
        self.conn.lock().execute_batch("ROLLBACK")
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> SqliteResult<StateEntry> {
    let id_hex: String = row.get(0)?;
    let id = StateId::parse(&id_hex).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let context_data: String = row.get(8)?;
    let denormalized: String = row.get(9)?;
    Ok(StateEntry {
        id,
        entity_kind: row.get(1)?,
        entity_id: row.get(2)?,
        organization_id: row.get(3)?,
        state: row.get(4)?,
        previous_state: row.get(5)?,
        transition_name: row.get(6)?,
        triggered_by: row.get::<_, Option<i64>>(7)?.map(UserRef),
        context_data: parse_map(8, &context_data)?,
        denormalized: parse_map(9, &denormalized)?,
        reason: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn parse_map(column: usize, raw: &str) -> SqliteResult<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(value.as_object().cloned().unwrap_or_default())
}
