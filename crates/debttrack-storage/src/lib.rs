//! DebtTrack Storage - persistence layer for the debt ledger.
//!
//! Uses redb as the embedded database. Every exposed operation is a single
//! transaction against the shared database handle.
//!
//! # Tables
//!
//! - `debtors` - debtor rows keyed by id
//! - `debtor_name_index` - `"{chat_id}:{name}"` -> debtor id (uniqueness)
//! - `debts` - debt rows keyed by id
//! - `counters` - id allocation for both entities

pub mod ledger;
pub mod money;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use ledger::{Debt, Debtor, LedgerStorage};
pub use money::Money;

/// Central storage manager.
pub struct Storage {
    db: Arc<Database>,
    pub ledger: LedgerStorage,
}

impl Storage {
    /// Create a storage instance at the given path, creating the database
    /// file and tables on first use.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);
        let ledger = LedgerStorage::new(db.clone())?;

        Ok(Self { db, ledger })
    }

    /// Get a reference to the underlying database.
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_bootstrap() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("test.db")).unwrap();

        let (debtor, is_new) = storage.ledger.add_debtor("Ivan", 1).unwrap();
        assert!(is_new);
        assert_eq!(storage.ledger.list_debtors(1).unwrap(), vec![debtor]);
    }
}
