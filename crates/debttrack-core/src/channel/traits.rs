//! Channel Trait Definition
//!
//! The seam between the conversation engine and whatever chat transport
//! delivers its messages.

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::{InboundUpdate, OutboundDocument, OutboundMessage};

/// A bidirectional chat channel.
///
/// Implementations send text/keyboards and documents into a chat and expose
/// incoming updates as a stream.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Check if the channel is properly configured.
    fn is_configured(&self) -> bool;

    /// Send a message (with optional inline keyboard) to a chat.
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Send a simple text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send(OutboundMessage::new(chat_id, text)).await
    }

    /// Deliver a document to a chat.
    async fn send_document(&self, document: OutboundDocument) -> Result<()>;

    /// Acknowledge a button press so the client stops showing a spinner.
    async fn ack_callback(&self, callback_id: &str) -> Result<()>;

    /// Start receiving updates (returns None if the channel cannot receive).
    ///
    /// The returned stream should be consumed from a single task; updates
    /// are yielded in the order the transport delivers them.
    fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundUpdate> + Send>>>;
}
