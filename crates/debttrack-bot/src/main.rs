mod config;
mod runner;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::BotConfig;
use debttrack_core::channel::TelegramChannel;
use debttrack_core::{Engine, paths};
use debttrack_storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    let db_path = paths::ensure_database_path()?;
    let storage = Arc::new(Storage::new(&db_path)?);
    info!("Ledger database at {}", db_path.display());

    let engine = Engine::new(storage);
    let channel = TelegramChannel::with_token(&config.bot_token);

    let me = channel.test_connection().await?;
    info!(
        "Connected to Telegram as @{}",
        me.username.as_deref().unwrap_or("unknown")
    );

    runner::run(&channel, &engine).await
}
