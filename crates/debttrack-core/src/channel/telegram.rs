//! Telegram Channel Implementation
//!
//! Implements bidirectional communication with Telegram via Bot API.
//! Receives messages and button presses via long-polling; sends text with
//! inline keyboards and uploads documents.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::traits::Channel;
use super::types::{InboundUpdate, InlineKeyboard, OutboundDocument, OutboundMessage};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org/bot";
/// Default timeout for Telegram API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Polling timeout in seconds (default: 30)
    #[serde(default = "default_polling_timeout")]
    pub polling_timeout: u32,
}

fn default_polling_timeout() -> u32 {
    30
}

impl TelegramConfig {
    /// Create a new config with just the bot token
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            polling_timeout: default_polling_timeout(),
        }
    }

    /// Set polling timeout
    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }
}

/// Telegram channel implementation
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    /// Whether polling is active
    polling_active: Arc<AtomicBool>,
    /// Last update ID for long-polling
    last_update_id: Arc<AtomicI64>,
}

impl TelegramChannel {
    /// Create a new Telegram channel
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            polling_active: Arc::new(AtomicBool::new(false)),
            last_update_id: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Create with just bot token
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self::new(TelegramConfig::new(bot_token))
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}{}/{}", TELEGRAM_API_BASE, self.config.bot_token, method)
    }

    /// Build sendMessage parameters, including the inline keyboard markup.
    fn message_params(message: &OutboundMessage) -> serde_json::Value {
        let mut params = serde_json::json!({
            "chat_id": message.chat_id,
            "text": message.text,
        });

        if let Some(mode) = &message.parse_mode {
            params["parse_mode"] = serde_json::Value::String(mode.clone());
        }

        if let Some(keyboard) = &message.keyboard
            && !keyboard.is_empty()
        {
            params["reply_markup"] = Self::keyboard_markup(keyboard);
        }

        params
    }

    fn keyboard_markup(keyboard: &InlineKeyboard) -> serde_json::Value {
        serde_json::json!({ "inline_keyboard": keyboard.rows })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&params)
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram HTTP error: {}", error));
        }

        let api_response: TelegramResponse<T> = response.json().await?;
        if api_response.ok {
            api_response
                .result
                .ok_or_else(|| anyhow!("Telegram returned ok but no result"))
        } else {
            Err(anyhow!(
                "Telegram API error: {}",
                api_response.description.unwrap_or_default()
            ))
        }
    }

    /// Poll for updates using long-polling
    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.config.polling_timeout,
            "allowed_updates": ["message", "callback_query"],
        });

        let response = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&params)
            .timeout(std::time::Duration::from_secs(
                self.config.polling_timeout as u64 + 10,
            ))
            .send()
            .await?;

        let body: TelegramResponse<Vec<TelegramUpdate>> = response.json().await?;

        if !body.ok {
            return Err(anyhow!(
                "Telegram API error: {:?}",
                body.description.unwrap_or_default()
            ));
        }

        let updates = body.result.unwrap_or_default();

        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }

        Ok(updates)
    }

    /// Convert a Telegram update to an InboundUpdate
    fn convert_update(update: TelegramUpdate) -> Option<InboundUpdate> {
        if let Some(message) = update.message {
            let text = message.text?;
            return Some(InboundUpdate::text(message.chat.id, text));
        }

        if let Some(query) = update.callback_query {
            let chat_id = query.message.as_ref().map(|m| m.chat.id)?;
            let data = query.data?;
            return Some(InboundUpdate::callback(chat_id, query.id, data));
        }

        None
    }

    /// Test the connection by calling getMe
    pub async fn test_connection(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        let body: TelegramResponse<TelegramUser> = response.json().await?;

        if body.ok {
            body.result
                .ok_or_else(|| anyhow!("Telegram returned ok but no result"))
        } else {
            Err(anyhow!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            ))
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let params = Self::message_params(&message);
        let _: TelegramMessageResponse = self.call("sendMessage", params).await?;
        Ok(())
    }

    async fn send_document(&self, document: OutboundDocument) -> Result<()> {
        let form = reqwest::multipart::Form::new()
            .text("chat_id", document.chat_id.to_string())
            .part(
                "document",
                reqwest::multipart::Part::bytes(document.bytes).file_name(document.filename),
            );

        let response = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram HTTP error: {}", error));
        }

        let body: TelegramResponse<TelegramMessageResponse> = response.json().await?;
        if !body.ok {
            return Err(anyhow!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            ));
        }

        Ok(())
    }

    async fn ack_callback(&self, callback_id: &str) -> Result<()> {
        let params = serde_json::json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", params).await?;
        Ok(())
    }

    fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundUpdate> + Send>>> {
        if !self.is_configured() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let polling_active = self.polling_active.clone();
        let last_update_id = self.last_update_id.clone();
        let config = self.config.clone();
        let client = self.client.clone();

        // Spawn polling task
        tokio::spawn(async move {
            polling_active.store(true, Ordering::SeqCst);
            info!("Starting Telegram polling");

            let channel = TelegramChannel {
                config,
                client,
                polling_active: polling_active.clone(),
                last_update_id,
            };

            while polling_active.load(Ordering::SeqCst) {
                match channel.poll_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            let Some(inbound) = Self::convert_update(update) else {
                                continue;
                            };
                            debug!("Received Telegram update for chat {}", inbound.chat_id);
                            if tx.send(inbound).is_err() {
                                warn!("Update receiver dropped, stopping polling");
                                polling_active.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        error!("Telegram polling error: {}", e);
                        // Back off on error
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }

            info!("Telegram polling stopped");
        });

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    #[allow(dead_code)]
    message_id: i64,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    data: Option<String>,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessageResponse {
    #[allow(dead_code)]
    message_id: i64,
}

// ============================================================================
// Tests
// ============================================================================
