//! Telegram-related errors.

use teloxide::RequestError;
use thiserror::Error;

/// Errors that can occur when talking to the Telegram Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed or the response could not be read.
    #[error("Telegram request failed: {0}")]
    Request(String),

    /// Bot API answered `ok: false`.
    #[error("Telegram API error: {0}")]
    Api(String),

    /// A configured URL does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Webhook secret header missing or wrong.
    #[error("Invalid webhook secret")]
    InvalidSecret,
}

impl From<RequestError> for TelegramError {
    fn from(error: RequestError) -> Self {
        match error {
            RequestError::Api(api) => Self::Api(api.to_string()),
            other => Self::Request(other.to_string()),
        }
    }
}
