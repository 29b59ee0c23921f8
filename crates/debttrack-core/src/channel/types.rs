//! Channel Types
//!
//! Transport-agnostic message types exchanged between the conversation
//! engine and a chat channel.

use serde::{Deserialize, Serialize};

/// Incoming update from a chat channel.
#[derive(Debug, Clone)]
pub struct InboundUpdate {
    /// Chat the update belongs to
    pub chat_id: i64,
    pub payload: UpdatePayload,
}

/// What the user actually did.
#[derive(Debug, Clone)]
pub enum UpdatePayload {
    /// A plain text message (commands included)
    Text { text: String },
    /// An inline-keyboard button press carrying its opaque data string
    Callback { callback_id: String, data: String },
}

impl InboundUpdate {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            payload: UpdatePayload::Text { text: text.into() },
        }
    }

    pub fn callback(
        chat_id: i64,
        callback_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            chat_id,
            payload: UpdatePayload::Callback {
                callback_id: callback_id.into(),
                data: data.into(),
            },
        }
    }
}

/// One inline-keyboard button: a label plus the callback data it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Rows of inline buttons attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row of buttons.
    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outbound chat message, optionally carrying an inline keyboard.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub chat_id: i64,
    /// Message content (Markdown by default)
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
    /// Parse mode (markdown, html, plain)
    pub parse_mode: Option<String>,
}

impl OutboundMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: None,
            parse_mode: Some("Markdown".to_string()),
        }
    }

    /// Attach an inline keyboard.
    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Set parse mode.
    pub fn with_parse_mode(mut self, mode: impl Into<String>) -> Self {
        self.parse_mode = Some(mode.into());
        self
    }
}

/// Outbound document handed to the channel for delivery, built in memory and
/// discarded after the send.
#[derive(Debug, Clone)]
pub struct OutboundDocument {
    pub chat_id: i64,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl OutboundDocument {
    pub fn new(chat_id: i64, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            chat_id,
            filename: filename.into(),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_message_defaults_to_markdown() {
        let msg = OutboundMessage::new(123, "hello");
        assert_eq!(msg.chat_id, 123);
        assert_eq!(msg.parse_mode.as_deref(), Some("Markdown"));
        assert!(msg.keyboard.is_none());
    }

    #[test]
    fn test_keyboard_builder() {
        let keyboard = InlineKeyboard::new()
            .row(vec![
                InlineButton::new("Yes", "confirm_close:1"),
                InlineButton::new("Cancel", "cancel_operation"),
            ])
            .row(vec![InlineButton::new("Add", "add_debt_to_existing")]);

        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(keyboard.rows[0][1].callback_data, "cancel_operation");
        assert!(!keyboard.is_empty());
    }

    #[test]
    fn test_inbound_update_constructors() {
        let text = InboundUpdate::text(5, "/debts");
        match text.payload {
            UpdatePayload::Text { text } => assert_eq!(text, "/debts"),
            _ => panic!("expected text payload"),
        }

        let cb = InboundUpdate::callback(5, "cb-1", "select_debtor:3");
        match cb.payload {
            UpdatePayload::Callback { callback_id, data } => {
                assert_eq!(callback_id, "cb-1");
                assert_eq!(data, "select_debtor:3");
            }
            _ => panic!("expected callback payload"),
        }
    }
}
