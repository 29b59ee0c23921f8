//! The receive loop: drains the channel's update stream, routes each update
//! through the engine, and delivers whatever the engine replies.
//!
//! One bad update never kills the loop. Storage faults become a single
//! generic failure message and leave the chat's session untouched, so the
//! user can retry the same input.

use anyhow::{Result, anyhow};
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use debttrack_core::channel::{Channel, OutboundMessage, UpdatePayload};
use debttrack_core::{Engine, Reply};

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
const EXPORT_DELIVERY_FAILURE: &str = "Failed to send the export file.";

pub async fn run<C: Channel + ?Sized>(channel: &C, engine: &Engine) -> Result<()> {
    let Some(mut stream) = channel.start_receiving() else {
        return Err(anyhow!("channel is not configured for receiving"));
    };

    info!("DebtTrack is listening for updates");

    while let Some(update) = stream.next().await {
        // Answer every button press so the client stops its spinner, no
        // matter how handling goes afterwards.
        if let UpdatePayload::Callback { callback_id, .. } = &update.payload
            && let Err(e) = channel.ack_callback(callback_id).await
        {
            warn!("Failed to acknowledge callback for chat {}: {}", update.chat_id, e);
        }

        let replies = match engine.handle_update(&update) {
            Ok(replies) => replies,
            Err(e) => {
                error!("Error handling update for chat {}: {}", update.chat_id, e);
                vec![Reply::Message(OutboundMessage::new(
                    update.chat_id,
                    GENERIC_FAILURE,
                ))]
            }
        };

        deliver(channel, update.chat_id, replies).await;
    }

    info!("Update stream ended, shutting down");
    Ok(())
}

async fn deliver<C: Channel + ?Sized>(channel: &C, chat_id: i64, replies: Vec<Reply>) {
    for reply in replies {
        match reply {
            Reply::Message(message) => {
                if let Err(e) = channel.send(message).await {
                    error!("Failed to send message to chat {}: {}", chat_id, e);
                }
            }
            Reply::Document(document) => {
                if let Err(e) = channel.send_document(document).await {
                    error!("Failed to send document to chat {}: {}", chat_id, e);
                    if let Err(e) = channel.send_text(chat_id, EXPORT_DELIVERY_FAILURE).await {
                        error!("Failed to report delivery failure to chat {}: {}", chat_id, e);
                    }
                }
            }
        }
    }
}
