//! Commands and button actions.
//!
//! Button payloads use the `action` / `action:<id>` convention; anything
//! that does not parse is dropped by the caller.

/// Slash commands exposed to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Add,
    Debts,
    Help,
    ExportCsv,
}

impl Command {
    /// Parse a command message. Accepts the `/cmd@BotName` form Telegram
    /// sends in group chats. Unknown commands return `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name {
            "start" => Some(Self::Start),
            "add" => Some(Self::Add),
            "debts" => Some(Self::Debts),
            "help" => Some(Self::Help),
            "exportcsv" => Some(Self::ExportCsv),
            _ => None,
        }
    }
}

/// Actions carried by inline-keyboard buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    SelectDebtor(u64),
    EditDebt(u64),
    EditAmount(u64),
    EditReason(u64),
    SubtractFromDebt(u64),
    CloseDebt(u64),
    ConfirmClose(u64),
    CancelOperation,
    AddDebtToExisting,
    DeleteDebtor,
    ConfirmDeleteDebtor,
    SetPaymentDate,
    SetPaymentAmount,
    ClearPaymentDate,
    ClearPaymentAmount,
    EditPaymentDate,
    EditPaymentAmount,
}

impl CallbackAction {
    /// Parse a button data string.
    pub fn parse(data: &str) -> Option<Self> {
        let (name, id) = match data.split_once(':') {
            Some((name, id)) => (name, Some(id.parse::<u64>().ok()?)),
            None => (data, None),
        };

        match (name, id) {
            ("select_debtor", Some(id)) => Some(Self::SelectDebtor(id)),
            ("edit_debt", Some(id)) => Some(Self::EditDebt(id)),
            ("edit_amount", Some(id)) => Some(Self::EditAmount(id)),
            ("edit_reason", Some(id)) => Some(Self::EditReason(id)),
            ("subtract_from_debt", Some(id)) => Some(Self::SubtractFromDebt(id)),
            ("close_debt", Some(id)) => Some(Self::CloseDebt(id)),
            ("confirm_close", Some(id)) => Some(Self::ConfirmClose(id)),
            ("cancel_operation", None) => Some(Self::CancelOperation),
            ("add_debt_to_existing", None) => Some(Self::AddDebtToExisting),
            ("delete_debtor", None) => Some(Self::DeleteDebtor),
            ("confirm_delete_debtor", None) => Some(Self::ConfirmDeleteDebtor),
            ("set_payment_date", None) => Some(Self::SetPaymentDate),
            ("set_payment_amount", None) => Some(Self::SetPaymentAmount),
            ("clear_payment_date", None) => Some(Self::ClearPaymentDate),
            ("clear_payment_amount", None) => Some(Self::ClearPaymentAmount),
            ("edit_payment_date", None) => Some(Self::EditPaymentDate),
            ("edit_payment_amount", None) => Some(Self::EditPaymentAmount),
            _ => None,
        }
    }

    /// The data string a button for this action carries.
    pub fn encode(&self) -> String {
        match self {
            Self::SelectDebtor(id) => format!("select_debtor:{}", id),
            Self::EditDebt(id) => format!("edit_debt:{}", id),
            Self::EditAmount(id) => format!("edit_amount:{}", id),
            Self::EditReason(id) => format!("edit_reason:{}", id),
            Self::SubtractFromDebt(id) => format!("subtract_from_debt:{}", id),
            Self::CloseDebt(id) => format!("close_debt:{}", id),
            Self::ConfirmClose(id) => format!("confirm_close:{}", id),
            Self::CancelOperation => "cancel_operation".to_string(),
            Self::AddDebtToExisting => "add_debt_to_existing".to_string(),
            Self::DeleteDebtor => "delete_debtor".to_string(),
            Self::ConfirmDeleteDebtor => "confirm_delete_debtor".to_string(),
            Self::SetPaymentDate => "set_payment_date".to_string(),
            Self::SetPaymentAmount => "set_payment_amount".to_string(),
            Self::ClearPaymentDate => "clear_payment_date".to_string(),
            Self::ClearPaymentAmount => "clear_payment_amount".to_string(),
            Self::EditPaymentDate => "edit_payment_date".to_string(),
            Self::EditPaymentAmount => "edit_payment_amount".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/exportcsv"), Some(Command::ExportCsv));
        assert_eq!(Command::parse("/add@DebtTrackBot"), Some(Command::Add));
        assert_eq!(Command::parse("  /debts extra words "), Some(Command::Debts));
    }

    #[test]
    fn test_command_parse_rejects_non_commands() {
        assert_eq!(Command::parse("add"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_action_round_trip() {
        let actions = [
            CallbackAction::SelectDebtor(3),
            CallbackAction::EditDebt(17),
            CallbackAction::EditAmount(17),
            CallbackAction::EditReason(17),
            CallbackAction::SubtractFromDebt(17),
            CallbackAction::CloseDebt(17),
            CallbackAction::ConfirmClose(17),
            CallbackAction::CancelOperation,
            CallbackAction::AddDebtToExisting,
            CallbackAction::DeleteDebtor,
            CallbackAction::ConfirmDeleteDebtor,
            CallbackAction::SetPaymentDate,
            CallbackAction::SetPaymentAmount,
            CallbackAction::ClearPaymentDate,
            CallbackAction::ClearPaymentAmount,
            CallbackAction::EditPaymentDate,
            CallbackAction::EditPaymentAmount,
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
    }

    #[test]
    fn test_action_parse_rejects_malformed_data() {
        assert_eq!(CallbackAction::parse("select_debtor"), None);
        assert_eq!(CallbackAction::parse("select_debtor:abc"), None);
        assert_eq!(CallbackAction::parse("cancel_operation:1"), None);
        assert_eq!(CallbackAction::parse("bogus:1"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }
}
