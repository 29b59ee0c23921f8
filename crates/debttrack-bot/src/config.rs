//! Bot configuration from the process environment.

use anyhow::{Result, bail};

/// Environment variable holding the bot token from @BotFather.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
}

impl BotConfig {
    /// Read configuration at startup. A missing or blank token is fatal
    /// here, not at request time.
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var(TOKEN_ENV)
            .map(|value| value.trim().to_string())
            .unwrap_or_default();

        if bot_token.is_empty() {
            bail!("{} is not set; the bot cannot start without a token", TOKEN_ENV);
        }

        Ok(Self { bot_token })
    }
}
