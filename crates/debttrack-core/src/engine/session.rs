//! Session Context
//!
//! Per-chat conversation state, process-lifetime only. The state variants
//! carry the debt currently in focus (and any input captured so far), so
//! resetting to `Idle` drops the debt focus by construction. The debtor in
//! focus lives beside the state and survives resets, letting a user add
//! another debt without re-selecting the debtor.

use dashmap::DashMap;
use debttrack_storage::Debtor;

/// Where a chat currently is in a conversation flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConversationState {
    #[default]
    Idle,
    AddingDebtorName,
    AddingDebtReason,
    AddingDebtAmount {
        reason: String,
    },
    ChoosingWhatToEdit {
        debt_id: u64,
    },
    EditingAmount {
        debt_id: u64,
    },
    EditingReason {
        debt_id: u64,
    },
    ConfirmingCloseDebt {
        debt_id: u64,
    },
    SubtractingFromDebt {
        debt_id: u64,
    },
    ConfirmingDeleteDebtor,
    SettingPaymentDate,
    SettingPaymentAmount,
    EditingPaymentDate,
    EditingPaymentAmount,
}

#[derive(Debug, Clone, Default)]
struct Session {
    state: ConversationState,
    debtor: Option<Debtor>,
}

/// Concurrent map of chat id to session. Chats never share a session, so
/// per-key locking is all the synchronization this needs.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<i64, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a chat; an absent session means `Idle`.
    pub fn state(&self, chat_id: i64) -> ConversationState {
        self.sessions
            .get(&chat_id)
            .map(|s| s.state.clone())
            .unwrap_or_default()
    }

    pub fn set_state(&self, chat_id: i64, state: ConversationState) {
        self.sessions.entry(chat_id).or_default().state = state;
    }

    /// Return to `Idle`, dropping any in-progress debt focus while keeping
    /// the debtor focus.
    pub fn reset(&self, chat_id: i64) {
        if let Some(mut session) = self.sessions.get_mut(&chat_id) {
            session.state = ConversationState::Idle;
        }
    }

    /// The debtor this chat is pointed at, if any.
    pub fn debtor(&self, chat_id: i64) -> Option<Debtor> {
        self.sessions.get(&chat_id).and_then(|s| s.debtor.clone())
    }

    pub fn set_debtor(&self, chat_id: i64, debtor: Debtor) {
        self.sessions.entry(chat_id).or_default().debtor = Some(debtor);
    }

    pub fn clear_debtor(&self, chat_id: i64) {
        if let Some(mut session) = self.sessions.get_mut(&chat_id) {
            session.debtor = None;
        }
    }
}
