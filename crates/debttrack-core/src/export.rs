//! CSV Export Encoder
//!
//! Renders a chat's full ledger into an in-memory CSV document. One row per
//! debt; a debtor without debts still gets exactly one sentinel row so every
//! debtor appears in the export.

use anyhow::Result;
use debttrack_storage::{Money, Storage};

use crate::engine::parse::format_payment_date;

/// File name the export is delivered under.
pub const EXPORT_FILENAME: &str = "debts.csv";

const HEADER: [&str; 6] = [
    "Debtor Name",
    "Total Debt",
    "Payment Date",
    "Payment Amount",
    "Debt Reason",
    "Debt Amount",
];

/// Build the CSV export for a chat. Returns `None` when the chat has no
/// debtors (no document is produced, not an empty one).
pub fn generate_export(storage: &Storage, chat_id: i64) -> Result<Option<Vec<u8>>> {
    let debtors = storage.ledger.list_debtors(chat_id)?;
    if debtors.is_empty() {
        return Ok(None);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for debtor in debtors {
        let debts = storage.ledger.list_debts(debtor.id)?;
        let total = storage.ledger.total_debt(debtor.id)?;

        let payment_date = debtor
            .payment_date
            .map(format_payment_date)
            .unwrap_or_default();
        let payment_amount = debtor
            .payment_amount
            .map(|a| a.to_string())
            .unwrap_or_default();

        if debts.is_empty() {
            writer.write_record([
                debtor.name.clone(),
                total.to_string(),
                payment_date,
                payment_amount,
                String::new(),
                Money::zero().to_string(),
            ])?;
        } else {
            for debt in &debts {
                writer.write_record([
                    debtor.name.clone(),
                    total.to_string(),
                    payment_date.clone(),
                    payment_amount.clone(),
                    debt.reason.clone(),
                    debt.amount.to_string(),
                ])?;
            }
        }
    }

    Ok(Some(writer.into_inner()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn storage() -> (tempfile::TempDir, Storage) {
        let tmp = tempdir().unwrap();
        let storage = Storage::new(tmp.path().join("test.db")).unwrap();
        (tmp, storage)
    }

    fn rows(bytes: &[u8]) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_export_without_debtors_is_absent() {
        let (_tmp, storage) = storage();
        assert!(generate_export(&storage, 1).unwrap().is_none());
    }

    #[test]
    fn test_export_rows_per_debt_with_fresh_totals() {
        let (_tmp, storage) = storage();
        let (ivan, _) = storage.ledger.add_debtor("Ivan", 1).unwrap();
        storage
            .ledger
            .add_debt(ivan.id, Money::from_minor(50000), "lunch")
            .unwrap();
        storage
            .ledger
            .add_debt(ivan.id, Money::from_minor(2550), "coffee")
            .unwrap();
        storage
            .ledger
            .set_payment_date(ivan.id, NaiveDate::from_ymd_opt(2025, 3, 5))
            .unwrap();
        storage
            .ledger
            .set_payment_amount(ivan.id, Some(Money::from_minor(15000)))
            .unwrap();

        let bytes = generate_export(&storage, 1).unwrap().unwrap();
        let rows = rows(&bytes);

        assert_eq!(rows[0], HEADER.map(str::to_string).to_vec());
        assert_eq!(
            rows[1],
            vec!["Ivan", "525.50", "05.03.2025", "150.00", "lunch", "500.00"]
        );
        assert_eq!(
            rows[2],
            vec!["Ivan", "525.50", "05.03.2025", "150.00", "coffee", "25.50"]
        );
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_export_sentinel_row_for_debtless_debtor() {
        let (_tmp, storage) = storage();
        storage.ledger.add_debtor("Maria", 1).unwrap();

        let bytes = generate_export(&storage, 1).unwrap().unwrap();
        let rows = rows(&bytes);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["Maria", "0.00", "", "", "", "0.00"]);
    }

    #[test]
    fn test_export_is_chat_scoped() {
        let (_tmp, storage) = storage();
        storage.ledger.add_debtor("Ivan", 1).unwrap();
        storage.ledger.add_debtor("Oleg", 2).unwrap();

        let bytes = generate_export(&storage, 1).unwrap().unwrap();
        let rows = rows(&bytes);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "Ivan");
    }
}
