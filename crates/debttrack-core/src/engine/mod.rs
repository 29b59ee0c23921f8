//! Conversation Engine
//!
//! The state machine interpreting free-text and button input against the
//! per-chat session, mutating the ledger, and producing outbound prompts and
//! menus. Delivery is the caller's job: every handler returns the replies to
//! send.
//!
//! Two rules hold everywhere. Ids carried over from a prior turn (button
//! payloads, the focused debtor) are re-checked against the store before
//! anything acts on them. And returning to `Idle` keeps the debtor focus
//! while dropping the debt focus, so "add another debt" works without
//! re-selecting the debtor.

pub mod action;
pub mod parse;
pub mod session;
pub mod view;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use debttrack_storage::{Debtor, Storage};

use crate::channel::{
    InboundUpdate, InlineButton, InlineKeyboard, OutboundDocument, OutboundMessage, UpdatePayload,
};
use crate::export;

use action::{CallbackAction, Command};
use session::{ConversationState, SessionStore};

const GREETING: &str = "Hi! I'm the DebtTrack bot. I help you keep track of debts.\n\n\
    Main commands:\n\
    /add - Record a debt\n\
    /debts - List debtors and their debts\n\
    /exportcsv - Export the ledger as CSV\n\
    /help - Help and command list";

const HELP: &str = "*DebtTrack commands:*\n\n\
    /add - Record a new debt. The bot asks for the debtor's name, the reason and the amount.\n\
    /debts - Show all your debtors. Pick one to see their debts, close or edit them.\n\
    /exportcsv - Export the ledger as a CSV file.\n\
    /help - Show this message with the command list.";

const USAGE_HINT: &str = "Use /add to record a debt and /debts to review them.";
const INVALID_AMOUNT: &str = "Enter a valid amount (a positive number).";
const INVALID_DATE: &str = "Invalid date format. Enter the date as DD.MM.YYYY or DD.MM.YY.";
const DEBTOR_NOT_FOUND: &str = "Debtor not found.";
const DEBT_NOT_FOUND: &str = "Debt not found.";
const NO_DEBTOR_SELECTED: &str = "No debtor is currently selected.";

/// What the engine wants delivered back to the chat.
#[derive(Debug)]
pub enum Reply {
    Message(OutboundMessage),
    Document(OutboundDocument),
}

impl Reply {
    fn message(chat_id: i64, text: impl Into<String>) -> Self {
        Self::Message(OutboundMessage::new(chat_id, text))
    }
}

/// The state a focus lookup can end in.
enum FocusDebtor {
    /// No debtor focused for this chat.
    None,
    /// A debtor was focused but no longer exists in the store.
    Stale,
    Found(Debtor),
}

/// The conversation engine. Handlers are synchronous; the async run loop
/// performs delivery.
pub struct Engine {
    storage: Arc<Storage>,
    sessions: SessionStore,
}

impl Engine {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            sessions: SessionStore::new(),
        }
    }

    /// Route one inbound update. Unknown commands and unparseable button
    /// data are dropped with a log line.
    pub fn handle_update(&self, update: &InboundUpdate) -> Result<Vec<Reply>> {
        match &update.payload {
            UpdatePayload::Text { text } => {
                if text.trim_start().starts_with('/') {
                    match Command::parse(text) {
                        Some(command) => self.handle_command(update.chat_id, command),
                        None => {
                            debug!("Ignoring unknown command from chat {}", update.chat_id);
                            Ok(Vec::new())
                        }
                    }
                } else {
                    self.handle_text(update.chat_id, text)
                }
            }
            UpdatePayload::Callback { data, .. } => match CallbackAction::parse(data) {
                Some(action) => self.handle_callback(update.chat_id, action),
                None => {
                    warn!(
                        "Ignoring malformed callback data {:?} from chat {}",
                        data, update.chat_id
                    );
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Handle a slash command. Every command resets the conversation first.
    pub fn handle_command(&self, chat_id: i64, command: Command) -> Result<Vec<Reply>> {
        self.sessions.reset(chat_id);

        match command {
            Command::Start => Ok(vec![Reply::message(chat_id, GREETING)]),
            Command::Help => Ok(vec![Reply::message(chat_id, HELP)]),
            Command::Add => {
                self.sessions
                    .set_state(chat_id, ConversationState::AddingDebtorName);
                Ok(vec![Reply::message(chat_id, "Enter the debtor's name:")])
            }
            Command::Debts => match view::debtor_list(&self.storage.ledger, chat_id)? {
                Some(message) => Ok(vec![Reply::Message(message)]),
                None => Ok(vec![Reply::message(
                    chat_id,
                    "You have no debtors yet. Use /add to record one.",
                )]),
            },
            Command::ExportCsv => match export::generate_export(&self.storage, chat_id)? {
                Some(bytes) => Ok(vec![Reply::Document(OutboundDocument::new(
                    chat_id,
                    export::EXPORT_FILENAME,
                    bytes,
                ))]),
                None => Ok(vec![Reply::message(
                    chat_id,
                    "Nothing to export yet. Add a debtor first.",
                )]),
            },
        }
    }

    /// Handle a free-text message according to the current state.
    pub fn handle_text(&self, chat_id: i64, text: &str) -> Result<Vec<Reply>> {
        let state = self.sessions.state(chat_id);

        match state {
            ConversationState::AddingDebtorName => {
                let name = text.trim();
                let (debtor, is_new) = self.storage.ledger.add_debtor(name, chat_id)?;
                if !is_new {
                    // Same name, same chat: resolve to the existing row but
                    // make the user pick another name for the new flow.
                    return Ok(vec![Reply::message(
                        chat_id,
                        format!(
                            "A debtor named *{}* already exists. Please enter another name.",
                            name
                        ),
                    )]);
                }

                let prompt = format!("What does *{}* owe for?", debtor.name);
                self.sessions.set_debtor(chat_id, debtor);
                self.sessions
                    .set_state(chat_id, ConversationState::AddingDebtReason);
                Ok(vec![Reply::message(chat_id, prompt)])
            }

            ConversationState::AddingDebtReason => {
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };

                let reason = text.trim().to_string();
                let prompt = format!("How much does *{}* owe for *{}*?", debtor.name, reason);
                self.sessions
                    .set_state(chat_id, ConversationState::AddingDebtAmount { reason });
                Ok(vec![Reply::message(chat_id, prompt)])
            }

            ConversationState::AddingDebtAmount { reason } => {
                let Some(amount) = parse::parse_positive_amount(text) else {
                    return Ok(vec![Reply::message(chat_id, INVALID_AMOUNT)]);
                };
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };

                self.storage.ledger.add_debt(debtor.id, amount, &reason)?;
                self.sessions.reset(chat_id);
                Ok(vec![Reply::message(
                    chat_id,
                    format!(
                        "✅ Debt recorded! *{}* owes *{}* for *{}*.",
                        debtor.name, amount, reason
                    ),
                )])
            }

            ConversationState::EditingAmount { debt_id } => {
                let Some(amount) = parse::parse_positive_amount(text) else {
                    return Ok(vec![Reply::message(chat_id, INVALID_AMOUNT)]);
                };
                let Some(debt) = self.storage.ledger.get_debt_by_id(debt_id)? else {
                    self.sessions.reset(chat_id);
                    return Ok(vec![Reply::message(chat_id, DEBT_NOT_FOUND)]);
                };

                self.storage.ledger.update_debt_amount(debt_id, amount)?;
                self.sessions.reset(chat_id);
                Ok(vec![
                    Reply::message(chat_id, "Debt amount updated."),
                    self.refresh_details(chat_id, debt.debtor_id)?,
                ])
            }

            ConversationState::EditingReason { debt_id } => {
                let Some(debt) = self.storage.ledger.get_debt_by_id(debt_id)? else {
                    self.sessions.reset(chat_id);
                    return Ok(vec![Reply::message(chat_id, DEBT_NOT_FOUND)]);
                };

                self.storage
                    .ledger
                    .update_debt_reason(debt_id, text.trim())?;
                self.sessions.reset(chat_id);
                Ok(vec![
                    Reply::message(chat_id, "Debt reason updated."),
                    self.refresh_details(chat_id, debt.debtor_id)?,
                ])
            }

            ConversationState::SubtractingFromDebt { debt_id } => {
                let Some(amount) = parse::parse_positive_amount(text) else {
                    return Ok(vec![Reply::message(chat_id, INVALID_AMOUNT)]);
                };
                let Some(debt) = self.storage.ledger.get_debt_by_id(debt_id)? else {
                    self.sessions.reset(chat_id);
                    return Ok(vec![Reply::message(chat_id, DEBT_NOT_FOUND)]);
                };
                if amount > debt.amount {
                    return Ok(vec![Reply::message(
                        chat_id,
                        "The amount to subtract cannot exceed the debt amount.",
                    )]);
                }

                let remaining = debt.amount - amount;
                let confirmation = if remaining.is_zero() {
                    // Repaid in full: the debt is closed, never stored as zero.
                    self.storage.ledger.close_debt(debt_id)?;
                    format!(
                        "✅ The debt of *{}* for *{}* is repaid and closed.",
                        debt.amount, debt.reason
                    )
                } else {
                    self.storage.ledger.update_debt_amount(debt_id, remaining)?;
                    format!("Subtracted *{}*. Remaining debt: *{}*.", amount, remaining)
                };

                self.sessions.reset(chat_id);
                Ok(vec![
                    Reply::message(chat_id, confirmation),
                    self.refresh_details(chat_id, debt.debtor_id)?,
                ])
            }

            ConversationState::SettingPaymentDate => self.apply_payment_date(chat_id, text, "set"),
            ConversationState::EditingPaymentDate => {
                self.apply_payment_date(chat_id, text, "updated")
            }

            ConversationState::SettingPaymentAmount | ConversationState::EditingPaymentAmount => {
                let Some(amount) = parse::parse_positive_amount(text) else {
                    return Ok(vec![Reply::message(chat_id, INVALID_AMOUNT)]);
                };
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };

                self.storage
                    .ledger
                    .set_payment_amount(debtor.id, Some(amount))?;
                self.sessions.reset(chat_id);
                Ok(vec![
                    Reply::message(
                        chat_id,
                        format!("Payment amount for *{}* set to *{}*.", debtor.name, amount),
                    ),
                    self.refresh_details(chat_id, debtor.id)?,
                ])
            }

            // Text while idle, or while a button menu is waiting: point the
            // user back at the commands.
            ConversationState::Idle
            | ConversationState::ChoosingWhatToEdit { .. }
            | ConversationState::ConfirmingCloseDebt { .. }
            | ConversationState::ConfirmingDeleteDebtor => {
                self.sessions.reset(chat_id);
                Ok(vec![Reply::message(chat_id, USAGE_HINT)])
            }
        }
    }

    /// Handle a button press.
    pub fn handle_callback(&self, chat_id: i64, action: CallbackAction) -> Result<Vec<Reply>> {
        match action {
            CallbackAction::SelectDebtor(debtor_id) => {
                let Some(debtor) = self.storage.ledger.get_debtor_by_id(debtor_id)? else {
                    self.sessions.reset(chat_id);
                    return Ok(vec![Reply::message(chat_id, DEBTOR_NOT_FOUND)]);
                };
                self.sessions.set_debtor(chat_id, debtor);
                self.sessions.reset(chat_id);
                Ok(vec![self.refresh_details(chat_id, debtor_id)?])
            }

            CallbackAction::EditDebt(debt_id) => {
                if self.storage.ledger.get_debt_by_id(debt_id)?.is_none() {
                    return Ok(vec![Reply::message(chat_id, DEBT_NOT_FOUND)]);
                }
                self.sessions
                    .set_state(chat_id, ConversationState::ChoosingWhatToEdit { debt_id });

                let keyboard = InlineKeyboard::new()
                    .row(vec![
                        InlineButton::new(
                            "Edit amount",
                            CallbackAction::EditAmount(debt_id).encode(),
                        ),
                        InlineButton::new(
                            "Edit reason",
                            CallbackAction::EditReason(debt_id).encode(),
                        ),
                    ])
                    .row(vec![InlineButton::new(
                        "Subtract from debt",
                        CallbackAction::SubtractFromDebt(debt_id).encode(),
                    )]);
                Ok(vec![Reply::Message(
                    OutboundMessage::new(chat_id, "What would you like to change?")
                        .with_keyboard(keyboard),
                )])
            }

            CallbackAction::EditAmount(debt_id) => {
                self.sessions
                    .set_state(chat_id, ConversationState::EditingAmount { debt_id });
                Ok(vec![Reply::message(chat_id, "Enter the new amount:")])
            }

            CallbackAction::EditReason(debt_id) => {
                self.sessions
                    .set_state(chat_id, ConversationState::EditingReason { debt_id });
                Ok(vec![Reply::message(chat_id, "Enter the new reason:")])
            }

            CallbackAction::SubtractFromDebt(debt_id) => {
                let Some(debt) = self.storage.ledger.get_debt_by_id(debt_id)? else {
                    return Ok(vec![Reply::message(chat_id, DEBT_NOT_FOUND)]);
                };
                self.sessions
                    .set_state(chat_id, ConversationState::SubtractingFromDebt { debt_id });
                Ok(vec![Reply::message(
                    chat_id,
                    format!("How much should be subtracted from *{}*?", debt.amount),
                )])
            }

            CallbackAction::CloseDebt(debt_id) => {
                let Some(debt) = self.storage.ledger.get_debt_by_id(debt_id)? else {
                    return Ok(vec![Reply::message(chat_id, DEBT_NOT_FOUND)]);
                };
                self.sessions
                    .set_state(chat_id, ConversationState::ConfirmingCloseDebt { debt_id });

                let keyboard = InlineKeyboard::new().row(vec![
                    InlineButton::new(
                        "✅ Yes, close",
                        CallbackAction::ConfirmClose(debt_id).encode(),
                    ),
                    InlineButton::new("❌ Cancel", CallbackAction::CancelOperation.encode()),
                ]);
                Ok(vec![Reply::Message(
                    OutboundMessage::new(
                        chat_id,
                        format!(
                            "Are you sure you want to close the debt of *{}* for *{}*?",
                            debt.amount, debt.reason
                        ),
                    )
                    .with_keyboard(keyboard),
                )])
            }

            CallbackAction::ConfirmClose(debt_id) => {
                let Some(debt) = self.storage.ledger.get_debt_by_id(debt_id)? else {
                    self.sessions.reset(chat_id);
                    return Ok(vec![Reply::message(chat_id, DEBT_NOT_FOUND)]);
                };
                self.storage.ledger.close_debt(debt_id)?;
                self.sessions.reset(chat_id);
                Ok(vec![
                    Reply::message(chat_id, "Debt closed."),
                    self.refresh_details(chat_id, debt.debtor_id)?,
                ])
            }

            CallbackAction::CancelOperation => {
                self.sessions.reset(chat_id);
                let mut replies = vec![Reply::message(chat_id, "Operation cancelled.")];
                if let FocusDebtor::Found(debtor) = self.focus_debtor(chat_id)? {
                    replies.push(self.refresh_details(chat_id, debtor.id)?);
                }
                Ok(replies)
            }

            CallbackAction::AddDebtToExisting => {
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };
                // Keep the focus, only switch state.
                self.sessions
                    .set_state(chat_id, ConversationState::AddingDebtReason);
                Ok(vec![Reply::message(
                    chat_id,
                    format!("What does *{}* owe for?", debtor.name),
                )])
            }

            CallbackAction::DeleteDebtor => {
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };
                self.sessions
                    .set_state(chat_id, ConversationState::ConfirmingDeleteDebtor);

                let keyboard = InlineKeyboard::new().row(vec![
                    InlineButton::new(
                        "✅ Yes, delete",
                        CallbackAction::ConfirmDeleteDebtor.encode(),
                    ),
                    InlineButton::new("❌ Cancel", CallbackAction::CancelOperation.encode()),
                ]);
                Ok(vec![Reply::Message(
                    OutboundMessage::new(
                        chat_id,
                        format!(
                            "Are you sure you want to delete *{}*? *All of their debts will be deleted!*",
                            debtor.name
                        ),
                    )
                    .with_keyboard(keyboard),
                )])
            }

            CallbackAction::ConfirmDeleteDebtor => {
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };
                self.storage.ledger.delete_debtor(debtor.id)?;
                self.sessions.clear_debtor(chat_id);
                self.sessions.reset(chat_id);
                Ok(vec![Reply::message(
                    chat_id,
                    format!(
                        "Debtor *{}* and all their debts have been deleted.",
                        debtor.name
                    ),
                )])
            }

            CallbackAction::SetPaymentDate | CallbackAction::EditPaymentDate => {
                let state = if action == CallbackAction::SetPaymentDate {
                    ConversationState::SettingPaymentDate
                } else {
                    ConversationState::EditingPaymentDate
                };
                self.sessions.set_state(chat_id, state);
                Ok(vec![Reply::message(
                    chat_id,
                    "Enter the payment date (DD.MM.YYYY or DD.MM.YY):",
                )])
            }

            CallbackAction::SetPaymentAmount | CallbackAction::EditPaymentAmount => {
                let state = if action == CallbackAction::SetPaymentAmount {
                    ConversationState::SettingPaymentAmount
                } else {
                    ConversationState::EditingPaymentAmount
                };
                self.sessions.set_state(chat_id, state);
                Ok(vec![Reply::message(chat_id, "Enter the payment amount:")])
            }

            CallbackAction::ClearPaymentDate => {
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };
                self.storage.ledger.set_payment_date(debtor.id, None)?;
                self.sessions.reset(chat_id);
                Ok(vec![
                    Reply::message(chat_id, "Payment date cleared."),
                    self.refresh_details(chat_id, debtor.id)?,
                ])
            }

            CallbackAction::ClearPaymentAmount => {
                let debtor = match self.focus_debtor(chat_id)? {
                    FocusDebtor::Found(debtor) => debtor,
                    missing => return Ok(vec![self.focus_error(chat_id, missing)]),
                };
                self.storage.ledger.set_payment_amount(debtor.id, None)?;
                self.sessions.reset(chat_id);
                Ok(vec![
                    Reply::message(chat_id, "Payment amount cleared."),
                    self.refresh_details(chat_id, debtor.id)?,
                ])
            }
        }
    }

    /// Complete a payment-date flow: validate, apply, refresh.
    fn apply_payment_date(&self, chat_id: i64, text: &str, verb: &str) -> Result<Vec<Reply>> {
        let Some(date) = parse::parse_payment_date(text) else {
            return Ok(vec![Reply::message(chat_id, INVALID_DATE)]);
        };
        let debtor = match self.focus_debtor(chat_id)? {
            FocusDebtor::Found(debtor) => debtor,
            missing => return Ok(vec![self.focus_error(chat_id, missing)]),
        };

        self.storage.ledger.set_payment_date(debtor.id, Some(date))?;
        self.sessions.reset(chat_id);
        Ok(vec![
            Reply::message(
                chat_id,
                format!(
                    "Payment date for *{}* {} to *{}*.",
                    debtor.name,
                    verb,
                    parse::format_payment_date(date)
                ),
            ),
            self.refresh_details(chat_id, debtor.id)?,
        ])
    }

    /// Re-render the detail view after a mutation and re-cache the freshly
    /// loaded debtor as the chat's focus.
    fn refresh_details(&self, chat_id: i64, debtor_id: u64) -> Result<Reply> {
        match view::debtor_details(&self.storage.ledger, chat_id, debtor_id)? {
            Some((message, debtor)) => {
                self.sessions.set_debtor(chat_id, debtor);
                Ok(Reply::Message(message))
            }
            None => Ok(Reply::message(chat_id, DEBTOR_NOT_FOUND)),
        }
    }

    /// Load the focused debtor fresh from the store. A focus pointing at a
    /// deleted row is cleared and reported as stale.
    fn focus_debtor(&self, chat_id: i64) -> Result<FocusDebtor> {
        let Some(cached) = self.sessions.debtor(chat_id) else {
            return Ok(FocusDebtor::None);
        };
        match self.storage.ledger.get_debtor_by_id(cached.id)? {
            Some(debtor) => Ok(FocusDebtor::Found(debtor)),
            None => {
                self.sessions.clear_debtor(chat_id);
                Ok(FocusDebtor::Stale)
            }
        }
    }

    /// Reply for a focus lookup that found nothing usable, resetting the
    /// conversation so the chat is not stuck mid-flow.
    fn focus_error(&self, chat_id: i64, lookup: FocusDebtor) -> Reply {
        self.sessions.reset(chat_id);
        match lookup {
            FocusDebtor::None => Reply::message(chat_id, NO_DEBTOR_SELECTED),
            _ => Reply::message(chat_id, DEBTOR_NOT_FOUND),
        }
    }
}
