//! Channel Layer
//!
//! Transport abstraction between the conversation engine and the chat
//! service delivering its messages.

pub mod telegram;
pub mod traits;
pub mod types;

pub use telegram::{TelegramChannel, TelegramConfig};
pub use traits::Channel;
pub use types::{
    InboundUpdate, InlineButton, InlineKeyboard, OutboundDocument, OutboundMessage, UpdatePayload,
};
