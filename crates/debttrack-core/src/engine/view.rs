//! Read-and-render views: the debtor detail card and the debtor list menu.

use anyhow::Result;
use debttrack_storage::{Debtor, LedgerStorage, Money};

use super::action::CallbackAction;
use super::parse::format_payment_date;
use crate::channel::{InlineButton, InlineKeyboard, OutboundMessage};

/// Render the detail card for a debtor: per-debt lines with edit/close
/// buttons, the total, both payment-schedule sections, and the trailing
/// add/delete actions. Returns the freshly loaded debtor alongside the
/// message so the caller can re-cache it as the chat's focus. `None` when
/// the debtor no longer exists.
pub fn debtor_details(
    ledger: &LedgerStorage,
    chat_id: i64,
    debtor_id: u64,
) -> Result<Option<(OutboundMessage, Debtor)>> {
    let Some(debtor) = ledger.get_debtor_by_id(debtor_id)? else {
        return Ok(None);
    };

    let debts = ledger.list_debts(debtor_id)?;
    let total: Money = debts.iter().map(|d| d.amount).sum();

    let mut text = format!("*Debts of {}:*\n\n", debtor.name);
    let mut keyboard = InlineKeyboard::new();

    for debt in &debts {
        text.push_str(&format!("- *{}* for *{}*\n", debt.amount, debt.reason));
        keyboard = keyboard.row(vec![
            InlineButton::new("✏️ Edit", CallbackAction::EditDebt(debt.id).encode()),
            InlineButton::new("✅ Close", CallbackAction::CloseDebt(debt.id).encode()),
        ]);
    }

    text.push_str(&format!("\n*Total debt: {}*", total));

    if let Some(date) = debtor.payment_date {
        text.push_str(&format!("\n\n*Payment date:* {}", format_payment_date(date)));
        keyboard = keyboard.row(vec![
            InlineButton::new("Change date", CallbackAction::EditPaymentDate.encode()),
            InlineButton::new("Clear date", CallbackAction::ClearPaymentDate.encode()),
        ]);
    } else {
        keyboard = keyboard.row(vec![InlineButton::new(
            "Set payment date",
            CallbackAction::SetPaymentDate.encode(),
        )]);
    }

    if let Some(amount) = debtor.payment_amount {
        text.push_str(&format!("\n*Payment amount:* {}", amount));
        keyboard = keyboard.row(vec![
            InlineButton::new("Change amount", CallbackAction::EditPaymentAmount.encode()),
            InlineButton::new("Clear amount", CallbackAction::ClearPaymentAmount.encode()),
        ]);
    } else {
        keyboard = keyboard.row(vec![InlineButton::new(
            "Set payment amount",
            CallbackAction::SetPaymentAmount.encode(),
        )]);
    }

    keyboard = keyboard.row(vec![
        InlineButton::new("➕ Add debt", CallbackAction::AddDebtToExisting.encode()),
        InlineButton::new("🗑️ Delete debtor", CallbackAction::DeleteDebtor.encode()),
    ]);

    let message = OutboundMessage::new(chat_id, text).with_keyboard(keyboard);
    Ok(Some((message, debtor)))
}

/// Render the `/debts` menu: one button per debtor with its debt count.
/// `None` when the chat has no debtors yet.
pub fn debtor_list(ledger: &LedgerStorage, chat_id: i64) -> Result<Option<OutboundMessage>> {
    let debtors = ledger.list_debtors(chat_id)?;
    if debtors.is_empty() {
        return Ok(None);
    }

    let mut keyboard = InlineKeyboard::new();
    for debtor in &debtors {
        let count = ledger.list_debts(debtor.id)?.len();
        let label = format!("{} ({} {})", debtor.name, count, pluralize_debts(count));
        keyboard = keyboard.row(vec![InlineButton::new(
            label,
            CallbackAction::SelectDebtor(debtor.id).encode(),
        )]);
    }

    Ok(Some(
        OutboundMessage::new(chat_id, "*Your debtors:*").with_keyboard(keyboard),
    ))
}

fn pluralize_debts(count: usize) -> &'static str {
    if count == 1 { "debt" } else { "debts" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debttrack_storage::Storage;
    use tempfile::tempdir;

    fn storage() -> (tempfile::TempDir, Storage) {
        let tmp = tempdir().unwrap();
        let storage = Storage::new(tmp.path().join("test.db")).unwrap();
        (tmp, storage)
    }

    #[test]
    fn test_details_for_missing_debtor() {
        let (_tmp, storage) = storage();
        assert!(debtor_details(&storage.ledger, 1, 99).unwrap().is_none());
    }

    #[test]
    fn test_details_lists_debts_and_total() {
        let (_tmp, storage) = storage();
        let (debtor, _) = storage.ledger.add_debtor("Ivan", 1).unwrap();
        storage
            .ledger
            .add_debt(debtor.id, Money::from_minor(50000), "lunch")
            .unwrap();
        storage
            .ledger
            .add_debt(debtor.id, Money::from_minor(2550), "coffee")
            .unwrap();

        let (message, loaded) = debtor_details(&storage.ledger, 1, debtor.id)
            .unwrap()
            .unwrap();

        assert_eq!(loaded.id, debtor.id);
        assert!(message.text.contains("*Debts of Ivan:*"));
        assert!(message.text.contains("*500.00* for *lunch*"));
        assert!(message.text.contains("*25.50* for *coffee*"));
        assert!(message.text.contains("*Total debt: 525.50*"));

        let keyboard = message.keyboard.unwrap();
        // Two debt rows, two schedule rows, one trailing actions row.
        assert_eq!(keyboard.rows.len(), 5);
        assert_eq!(keyboard.rows[0][0].callback_data, "edit_debt:1");
        assert_eq!(keyboard.rows[0][1].callback_data, "close_debt:1");
        assert_eq!(keyboard.rows[2][0].callback_data, "set_payment_date");
        assert_eq!(keyboard.rows[3][0].callback_data, "set_payment_amount");
        assert_eq!(keyboard.rows[4][1].callback_data, "delete_debtor");
    }

    #[test]
    fn test_details_with_schedule_set() {
        let (_tmp, storage) = storage();
        let (debtor, _) = storage.ledger.add_debtor("Ivan", 1).unwrap();
        storage
            .ledger
            .set_payment_date(
                debtor.id,
                Some(chrono::NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()),
            )
            .unwrap();
        storage
            .ledger
            .set_payment_amount(debtor.id, Some(Money::from_minor(15000)))
            .unwrap();

        let (message, _) = debtor_details(&storage.ledger, 1, debtor.id)
            .unwrap()
            .unwrap();

        assert!(message.text.contains("*Payment date:* 05.03.2025"));
        assert!(message.text.contains("*Payment amount:* 150.00"));

        let keyboard = message.keyboard.unwrap();
        assert_eq!(keyboard.rows[0][1].callback_data, "clear_payment_date");
        assert_eq!(keyboard.rows[1][1].callback_data, "clear_payment_amount");
    }

    #[test]
    fn test_debtor_list_empty() {
        let (_tmp, storage) = storage();
        assert!(debtor_list(&storage.ledger, 1).unwrap().is_none());
    }

    #[test]
    fn test_debtor_list_counts_and_pluralizes() {
        let (_tmp, storage) = storage();
        let (ivan, _) = storage.ledger.add_debtor("Ivan", 1).unwrap();
        let (maria, _) = storage.ledger.add_debtor("Maria", 1).unwrap();
        storage
            .ledger
            .add_debt(ivan.id, Money::from_minor(100), "a")
            .unwrap();
        // A debtor from another chat must not leak in.
        let (stranger, _) = storage.ledger.add_debtor("Oleg", 2).unwrap();
        storage
            .ledger
            .add_debt(stranger.id, Money::from_minor(100), "x")
            .unwrap();

        let message = debtor_list(&storage.ledger, 1).unwrap().unwrap();
        let keyboard = message.keyboard.unwrap();

        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(keyboard.rows[0][0].text, "Ivan (1 debt)");
        assert_eq!(
            keyboard.rows[0][0].callback_data,
            format!("select_debtor:{}", ivan.id)
        );
        assert_eq!(keyboard.rows[1][0].text, "Maria (0 debts)");
        assert_eq!(
            keyboard.rows[1][0].callback_data,
            format!("select_debtor:{}", maria.id)
        );
    }
}
