//! Unit of work: a transaction scope plus deferred post-commit actions.
//!
//! The write path never talks to a commit-hook facility of any particular
//! persistence engine. Instead it enqueues deferred actions here, and
//! [`UnitOfWork::commit`] runs them strictly after the underlying
//! transaction has committed. Dropping the unit of work without committing
//! rolls the transaction back and discards every deferred action — which is
//! exactly how the cache is kept from running ahead of committed truth.

use crate::db::StateDb;

type Deferred = Box<dyn FnOnce() + Send>;

/// An open transaction on the ledger plus its deferred actions.
pub struct UnitOfWork {
    db: StateDb,
    committed: bool,
    deferred: Vec<Deferred>,
}

impl UnitOfWork {
    /// Begin a transaction (`BEGIN IMMEDIATE`) on the ledger connection.
    pub fn begin(db: &StateDb) -> rusqlite::Result<Self> {
        db.begin_immediate()?;
        Ok(Self {
            db: db.clone(),
            committed: false,
            deferred: Vec::new(),
        })
    }

    /// Enqueue an action to run only after a successful commit.
    pub fn defer(&mut self, action: impl FnOnce() + Send + 'static) {
        self.deferred.push(Box::new(action));
    }

    /// Number of actions waiting on commit.
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Commit the transaction, then run deferred actions in enqueue order.
    ///
    /// If the commit itself fails, no deferred action runs.
    pub fn commit(mut self) -> rusqlite::Result<()> {
        self.db.commit()?;
        self.committed = true;
        for action in self.deferred.drain(..) {
            action();
        }
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.committed {
            // Best-effort rollback; deferred actions are discarded unrun.
            let _ = self.db.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_deferred_actions_run_only_on_commit() {
        let db = StateDb::in_memory().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut uow = UnitOfWork::begin(&db).unwrap();
        let f = fired.clone();
        uow.defer(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(uow.pending(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        uow.commit().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_discards_deferred_actions() {
        let db = StateDb::in_memory().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        {
            let mut uow = UnitOfWork::begin(&db).unwrap();
            let f = fired.clone();
            uow.defer(move || {
                f.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_actions_run_in_enqueue_order() {
        let db = StateDb::in_memory().unwrap();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut uow = UnitOfWork::begin(&db).unwrap();
        for n in 0..3 {
            let o = order.clone();
            uow.defer(move || o.lock().push(n));
        }
        uow.commit().unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_rollback_reverts_writes() {
        let db = StateDb::in_memory().unwrap();
        let ids = joutai_types::FixedBaseIdGenerator::new(1_700_000_000_000);

        {
            let _uow = UnitOfWork::begin(&db).unwrap();
            db.insert(&crate::entry::StateEntry {
                id: ids.generate_at(0),
                entity_kind: "task".to_string(),
                entity_id: 1,
                organization_id: None,
                state: "CREATED".to_string(),
                previous_state: None,
                transition_name: None,
                triggered_by: None,
                context_data: Default::default(),
                denormalized: Default::default(),
                reason: String::new(),
                created_at: 0,
            })
            .unwrap();
            // dropped without commit
        }
        assert!(db.current_entry("task", 1).unwrap().is_none());
    }
}
