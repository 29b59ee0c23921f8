//! Ledger storage - debtors and their debts.
//!
//! Two entity tables plus a name index and an id counter table. Every
//! operation is a single redb transaction; deleting a debtor removes its
//! debts inside the same write transaction.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::money::Money;

const DEBTORS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("debtors");
const DEBTOR_NAME_INDEX: TableDefinition<&str, u64> = TableDefinition::new("debtor_name_index");
const DEBTS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("debts");
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const DEBTOR_COUNTER: &str = "debtor";
const DEBT_COUNTER: &str = "debt";

/// A named party owing debts, scoped to one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debtor {
    pub id: u64,
    pub name: String,
    pub chat_id: i64,
    pub payment_date: Option<NaiveDate>,
    pub payment_amount: Option<Money>,
}

/// One owed amount with a reason. The amount is strictly positive while the
/// row exists; a debt repaid down to zero is deleted, never stored as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub id: u64,
    pub debtor_id: u64,
    pub amount: Money,
    pub reason: String,
}

/// Ledger storage over the shared database.
#[derive(Debug, Clone)]
pub struct LedgerStorage {
    db: Arc<Database>,
}

impl LedgerStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(DEBTORS_TABLE)?;
        write_txn.open_table(DEBTOR_NAME_INDEX)?;
        write_txn.open_table(DEBTS_TABLE)?;
        write_txn.open_table(COUNTERS_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn name_key(chat_id: i64, name: &str) -> String {
        format!("{}:{}", chat_id, name)
    }

    /// Add a debtor, or return the existing row when the (name, chat) pair is
    /// already taken. The uniqueness check and the insert share one write
    /// transaction, so a conflicting row can never be half-created.
    pub fn add_debtor(&self, name: &str, chat_id: i64) -> Result<(Debtor, bool)> {
        let key = Self::name_key(chat_id, name);
        let write_txn = self.db.begin_write()?;
        let (debtor, is_new) = {
            let mut index = write_txn.open_table(DEBTOR_NAME_INDEX)?;
            let existing = index.get(key.as_str())?.map(|v| v.value());

            if let Some(id) = existing {
                let debtors = write_txn.open_table(DEBTORS_TABLE)?;
                let data = debtors
                    .get(id)?
                    .ok_or_else(|| anyhow!("debtor index points at missing row {}", id))?;
                (serde_json::from_slice(data.value())?, false)
            } else {
                let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
                let id = counters.get(DEBTOR_COUNTER)?.map(|v| v.value()).unwrap_or(0) + 1;
                counters.insert(DEBTOR_COUNTER, id)?;
                drop(counters);

                let debtor = Debtor {
                    id,
                    name: name.to_string(),
                    chat_id,
                    payment_date: None,
                    payment_amount: None,
                };

                let mut debtors = write_txn.open_table(DEBTORS_TABLE)?;
                debtors.insert(id, serde_json::to_vec(&debtor)?.as_slice())?;
                index.insert(key.as_str(), id)?;
                debug!("Created debtor {} ({}) for chat {}", id, name, chat_id);
                (debtor, true)
            }
        };
        write_txn.commit()?;
        Ok((debtor, is_new))
    }

    pub fn get_debtor_by_name(&self, name: &str, chat_id: i64) -> Result<Option<Debtor>> {
        let key = Self::name_key(chat_id, name);
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DEBTOR_NAME_INDEX)?;

        let Some(id) = index.get(key.as_str())?.map(|v| v.value()) else {
            return Ok(None);
        };

        let debtors = read_txn.open_table(DEBTORS_TABLE)?;
        match debtors.get(id)? {
            Some(data) => Ok(Some(serde_json::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_debtor_by_id(&self, id: u64) -> Result<Option<Debtor>> {
        let read_txn = self.db.begin_read()?;
        let debtors = read_txn.open_table(DEBTORS_TABLE)?;
        match debtors.get(id)? {
            Some(data) => Ok(Some(serde_json::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// All debtors owned by a chat, in insertion order.
    pub fn list_debtors(&self, chat_id: i64) -> Result<Vec<Debtor>> {
        let read_txn = self.db.begin_read()?;
        let debtors = read_txn.open_table(DEBTORS_TABLE)?;

        let mut result = Vec::new();
        for item in debtors.iter()? {
            let (_, value) = item?;
            let debtor: Debtor = serde_json::from_slice(value.value())?;
            if debtor.chat_id == chat_id {
                result.push(debtor);
            }
        }
        Ok(result)
    }

    /// Add a debt. The caller validates that `amount` is positive.
    pub fn add_debt(&self, debtor_id: u64, amount: Money, reason: &str) -> Result<Debt> {
        let write_txn = self.db.begin_write()?;
        let debt = {
            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            let id = counters.get(DEBT_COUNTER)?.map(|v| v.value()).unwrap_or(0) + 1;
            counters.insert(DEBT_COUNTER, id)?;
            drop(counters);

            let debt = Debt {
                id,
                debtor_id,
                amount,
                reason: reason.to_string(),
            };

            let mut debts = write_txn.open_table(DEBTS_TABLE)?;
            debts.insert(id, serde_json::to_vec(&debt)?.as_slice())?;
            debug!("Created debt {} of {} for debtor {}", id, amount, debtor_id);
            debt
        };
        write_txn.commit()?;
        Ok(debt)
    }

    /// All debts of a debtor, in insertion order.
    pub fn list_debts(&self, debtor_id: u64) -> Result<Vec<Debt>> {
        let read_txn = self.db.begin_read()?;
        let debts = read_txn.open_table(DEBTS_TABLE)?;

        let mut result = Vec::new();
        for item in debts.iter()? {
            let (_, value) = item?;
            let debt: Debt = serde_json::from_slice(value.value())?;
            if debt.debtor_id == debtor_id {
                result.push(debt);
            }
        }
        Ok(result)
    }

    pub fn get_debt_by_id(&self, id: u64) -> Result<Option<Debt>> {
        let read_txn = self.db.begin_read()?;
        let debts = read_txn.open_table(DEBTS_TABLE)?;
        match debts.get(id)? {
            Some(data) => Ok(Some(serde_json::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Exact sum of a debtor's outstanding debts.
    pub fn total_debt(&self, debtor_id: u64) -> Result<Money> {
        Ok(self.list_debts(debtor_id)?.iter().map(|d| d.amount).sum())
    }

    pub fn update_debt_amount(&self, id: u64, amount: Money) -> Result<()> {
        self.modify_debt(id, |debt| debt.amount = amount)
    }

    pub fn update_debt_reason(&self, id: u64, reason: &str) -> Result<()> {
        self.modify_debt(id, |debt| debt.reason = reason.to_string())
    }

    /// Close a debt by deleting its row. Returns whether the row existed.
    pub fn close_debt(&self, id: u64) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut debts = write_txn.open_table(DEBTS_TABLE)?;
            debts.remove(id)?.is_some()
        };
        write_txn.commit()?;
        if existed {
            debug!("Closed debt {}", id);
        }
        Ok(existed)
    }

    /// Delete a debtor together with its name-index entry and all of its
    /// debts. One write transaction, so the cascade cannot be half-applied.
    pub fn delete_debtor(&self, id: u64) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut debtors = write_txn.open_table(DEBTORS_TABLE)?;
            let removed = match debtors.remove(id)? {
                Some(guard) => {
                    let debtor: Debtor = serde_json::from_slice(guard.value())?;
                    Some(debtor)
                }
                None => None,
            };
            drop(debtors);

            match removed {
                None => false,
                Some(debtor) => {
                    let mut index = write_txn.open_table(DEBTOR_NAME_INDEX)?;
                    index.remove(Self::name_key(debtor.chat_id, &debtor.name).as_str())?;
                    drop(index);

                    let mut debts = write_txn.open_table(DEBTS_TABLE)?;
                    let mut doomed = Vec::new();
                    for item in debts.iter()? {
                        let (key, value) = item?;
                        let debt: Debt = serde_json::from_slice(value.value())?;
                        if debt.debtor_id == id {
                            doomed.push(key.value());
                        }
                    }
                    for debt_id in &doomed {
                        debts.remove(debt_id)?;
                    }
                    debug!("Deleted debtor {} and {} debts", id, doomed.len());
                    true
                }
            }
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Set or clear the scheduled payment date.
    pub fn set_payment_date(&self, id: u64, date: Option<NaiveDate>) -> Result<()> {
        self.modify_debtor(id, |debtor| debtor.payment_date = date)
    }

    /// Set or clear the scheduled payment amount.
    pub fn set_payment_amount(&self, id: u64, amount: Option<Money>) -> Result<()> {
        self.modify_debtor(id, |debtor| debtor.payment_amount = amount)
    }

    fn modify_debt<F: FnOnce(&mut Debt)>(&self, id: u64, apply: F) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut debts = write_txn.open_table(DEBTS_TABLE)?;
            let mut debt: Debt = match debts.get(id)? {
                Some(data) => serde_json::from_slice(data.value())?,
                None => return Err(anyhow!("debt {} not found", id)),
            };
            apply(&mut debt);
            debts.insert(id, serde_json::to_vec(&debt)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn modify_debtor<F: FnOnce(&mut Debtor)>(&self, id: u64, apply: F) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut debtors = write_txn.open_table(DEBTORS_TABLE)?;
            let mut debtor: Debtor = match debtors.get(id)? {
                Some(data) => serde_json::from_slice(data.value())?,
                None => return Err(anyhow!("debtor {} not found", id)),
            };
            apply(&mut debtor);
            debtors.insert(id, serde_json::to_vec(&debtor)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ledger() -> (tempfile::TempDir, LedgerStorage) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let ledger = LedgerStorage::new(db).unwrap();
        (temp_dir, ledger)
    }

    #[test]
    fn test_add_debtor_twice_resolves_to_existing() {
        let (_tmp, ledger) = ledger();

        let (first, is_new) = ledger.add_debtor("Ivan", 100).unwrap();
        assert!(is_new);

        let (second, is_new) = ledger.add_debtor("Ivan", 100).unwrap();
        assert!(!is_new);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_same_name_in_different_chats_is_distinct() {
        let (_tmp, ledger) = ledger();

        let (a, _) = ledger.add_debtor("Ivan", 100).unwrap();
        let (b, is_new) = ledger.add_debtor("Ivan", 200).unwrap();
        assert!(is_new);
        assert_ne!(a.id, b.id);

        assert_eq!(ledger.list_debtors(100).unwrap().len(), 1);
        assert_eq!(ledger.list_debtors(200).unwrap().len(), 1);
    }

    #[test]
    fn test_add_debt_and_list() {
        let (_tmp, ledger) = ledger();
        let (debtor, _) = ledger.add_debtor("Ivan", 100).unwrap();

        let debt = ledger
            .add_debt(debtor.id, Money::from_minor(50000), "lunch")
            .unwrap();

        let debts = ledger.list_debts(debtor.id).unwrap();
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].id, debt.id);
        assert_eq!(debts[0].amount, Money::from_minor(50000));
        assert_eq!(debts[0].reason, "lunch");
    }

    #[test]
    fn test_get_debt_and_update() {
        let (_tmp, ledger) = ledger();
        let (debtor, _) = ledger.add_debtor("Ivan", 100).unwrap();
        let debt = ledger
            .add_debt(debtor.id, Money::from_minor(1000), "coffee")
            .unwrap();

        ledger
            .update_debt_amount(debt.id, Money::from_minor(700))
            .unwrap();
        ledger.update_debt_reason(debt.id, "espresso").unwrap();

        let reloaded = ledger.get_debt_by_id(debt.id).unwrap().unwrap();
        assert_eq!(reloaded.amount, Money::from_minor(700));
        assert_eq!(reloaded.reason, "espresso");
    }

    #[test]
    fn test_update_missing_debt_errors() {
        let (_tmp, ledger) = ledger();
        assert!(ledger.update_debt_amount(42, Money::from_minor(1)).is_err());
    }

    #[test]
    fn test_close_debt_removes_row() {
        let (_tmp, ledger) = ledger();
        let (debtor, _) = ledger.add_debtor("Ivan", 100).unwrap();
        let debt = ledger
            .add_debt(debtor.id, Money::from_minor(1000), "coffee")
            .unwrap();

        assert!(ledger.close_debt(debt.id).unwrap());
        assert!(ledger.get_debt_by_id(debt.id).unwrap().is_none());
        assert!(!ledger.close_debt(debt.id).unwrap());
    }

    #[test]
    fn test_delete_debtor_cascades_to_debts() {
        let (_tmp, ledger) = ledger();
        let (debtor, _) = ledger.add_debtor("Ivan", 100).unwrap();
        let (other, _) = ledger.add_debtor("Maria", 100).unwrap();
        ledger
            .add_debt(debtor.id, Money::from_minor(100), "a")
            .unwrap();
        ledger
            .add_debt(debtor.id, Money::from_minor(200), "b")
            .unwrap();
        let kept = ledger
            .add_debt(other.id, Money::from_minor(300), "c")
            .unwrap();

        assert!(ledger.delete_debtor(debtor.id).unwrap());

        assert!(ledger.get_debtor_by_id(debtor.id).unwrap().is_none());
        assert!(ledger.list_debts(debtor.id).unwrap().is_empty());
        // Other debtors are untouched.
        assert_eq!(ledger.list_debts(other.id).unwrap(), vec![kept]);
        // The name becomes available again.
        let (_, is_new) = ledger.add_debtor("Ivan", 100).unwrap();
        assert!(is_new);
    }

    #[test]
    fn test_delete_missing_debtor() {
        let (_tmp, ledger) = ledger();
        assert!(!ledger.delete_debtor(7).unwrap());
    }

    #[test]
    fn test_payment_fields_are_independent() {
        let (_tmp, ledger) = ledger();
        let (debtor, _) = ledger.add_debtor("Ivan", 100).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        ledger.set_payment_date(debtor.id, Some(date)).unwrap();
        ledger
            .set_payment_amount(debtor.id, Some(Money::from_minor(15000)))
            .unwrap();

        let reloaded = ledger.get_debtor_by_id(debtor.id).unwrap().unwrap();
        assert_eq!(reloaded.payment_date, Some(date));
        assert_eq!(reloaded.payment_amount, Some(Money::from_minor(15000)));

        ledger.set_payment_date(debtor.id, None).unwrap();
        let reloaded = ledger.get_debtor_by_id(debtor.id).unwrap().unwrap();
        assert_eq!(reloaded.payment_date, None);
        assert_eq!(reloaded.payment_amount, Some(Money::from_minor(15000)));
    }

    #[test]
    fn test_total_debt() {
        let (_tmp, ledger) = ledger();
        let (debtor, _) = ledger.add_debtor("Ivan", 100).unwrap();
        assert!(ledger.total_debt(debtor.id).unwrap().is_zero());

        ledger
            .add_debt(debtor.id, Money::from_minor(10050), "a")
            .unwrap();
        ledger
            .add_debt(debtor.id, Money::from_minor(9950), "b")
            .unwrap();
        assert_eq!(
            ledger.total_debt(debtor.id).unwrap(),
            Money::from_minor(20000)
        );
    }

    #[test]
    fn test_get_debtor_by_name() {
        let (_tmp, ledger) = ledger();
        let (debtor, _) = ledger.add_debtor("Ivan", 100).unwrap();

        let found = ledger.get_debtor_by_name("Ivan", 100).unwrap().unwrap();
        assert_eq!(found, debtor);
        assert!(ledger.get_debtor_by_name("Ivan", 999).unwrap().is_none());
        assert!(ledger.get_debtor_by_name("Maria", 100).unwrap().is_none());
    }
}
