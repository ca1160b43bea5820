//! Telegram webhook registration.
//!
//! # Usage
//!
//! ```bash
//! poizon-cli webhook set --url https://example.com/api/telegram/webhook
//! poizon-cli webhook delete
//! ```
//!
//! # Environment Variables
//!
//! - `TELEGRAM_BOT_TOKEN` - Bot API token
//! - `TELEGRAM_ADMIN_CHAT_ID` - Admin chat id (validated with the rest of
//!   the Telegram settings)
//! - `TELEGRAM_WEBHOOK_SECRET` - Optional secret Telegram echoes back in
//!   `X-Telegram-Bot-Api-Secret-Token`

use std::time::Duration;

use poizon_server::config::{ConfigError, TelegramConfig};
use poizon_server::telegram::{TelegramClient, TelegramError};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while managing the webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("Webhook URL must use https: {0}")]
    InsecureUrl(String),
}

fn client() -> Result<(TelegramClient, TelegramConfig), WebhookError> {
    let config = TelegramConfig::from_env()?;
    let client = TelegramClient::new(config.bot_token.clone(), REQUEST_TIMEOUT)?;
    Ok((client, config))
}

/// Point the bot's webhook at `url`.
///
/// # Errors
///
/// Returns an error if the URL is not https, configuration is missing, or
/// Telegram rejects the request.
pub async fn set(url: &str) -> Result<(), WebhookError> {
    if !url.starts_with("https://") {
        return Err(WebhookError::InsecureUrl(url.to_string()));
    }
    let (client, config) = client()?;
    if config.webhook_secret.is_none() {
        tracing::warn!("TELEGRAM_WEBHOOK_SECRET is not set; webhook requests will not be authenticated");
    }

    client.set_webhook(url, config.webhook_secret.as_ref()).await?;
    tracing::info!(url, "Webhook registered");
    Ok(())
}

/// Remove the bot's webhook.
///
/// # Errors
///
/// Returns an error if configuration is missing or Telegram rejects the
/// request.
pub async fn delete() -> Result<(), WebhookError> {
    let (client, _) = client()?;
    client.delete_webhook().await?;
    tracing::info!("Webhook removed");
    Ok(())
}
