//! Telegram Bot API client.
//!
//! A thin layer over [`teloxide::Bot`] that applies the builders'
//! [`OutgoingMessage`] (parse mode and keyboard) to each request. Also
//! verifies the webhook secret header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use teloxide::Bot;
use teloxide::payloads::{
    AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters, SetWebhookSetters,
};
use teloxide::requests::Requester;
use teloxide::types::{AllowedUpdate, ChatId, Message, MessageId, ParseMode};
use tracing::{debug, instrument};
use url::Url;

use super::error::TelegramError;
use super::messages::OutgoingMessage;

/// Bot API base URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
    /// API base, overridable for tests.
    api_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("bot_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns `TelegramError::Request` if the HTTP client cannot be built.
    pub fn new(bot_token: SecretString, timeout: Duration) -> Result<Self, TelegramError> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .map_err(|e| TelegramError::Request(e.to_string()))?;

        Ok(Self {
            bot: Bot::with_client(bot_token.expose_secret(), client),
            api_url: TELEGRAM_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API host.
    ///
    /// # Errors
    ///
    /// Returns `TelegramError::InvalidUrl` if `api_url` does not parse.
    pub fn with_base_url(mut self, api_url: &str) -> Result<Self, TelegramError> {
        let parsed = Url::parse(api_url).map_err(|e| TelegramError::InvalidUrl(e.to_string()))?;
        self.bot = self.bot.set_api_url(parsed);
        self.api_url = api_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Send a message to a chat.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Telegram returns an error.
    #[instrument(skip(self, message), fields(chat_id = chat_id.0))]
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
    ) -> Result<Message, TelegramError> {
        let mut request = self.bot.send_message(chat_id, message.text.clone());
        if message.markdown {
            request = request.parse_mode(ParseMode::MarkdownV2);
        }
        if let Some(markup) = &message.reply_markup {
            request = request.reply_markup(markup.clone());
        }

        let sent = request.await?;
        debug!(message_id = sent.id.0, "Message sent to Telegram");
        Ok(sent)
    }

    /// Replace the text and keyboard of an existing message.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Telegram returns an error.
    #[instrument(skip(self, message), fields(chat_id = chat_id.0, message_id = message_id.0))]
    pub async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutgoingMessage,
    ) -> Result<(), TelegramError> {
        let mut request = self
            .bot
            .edit_message_text(chat_id, message_id, message.text.clone());
        if message.markdown {
            request = request.parse_mode(ParseMode::MarkdownV2);
        }
        if let Some(markup) = &message.reply_markup {
            request = request.reply_markup(markup.clone());
        }

        request.await?;
        debug!("Message edited");
        Ok(())
    }

    /// Acknowledge a button press, optionally with a toast.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Telegram returns an error.
    #[instrument(skip(self, text))]
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut request = self.bot.answer_callback_query(callback_query_id.to_string());
        if let Some(text) = text {
            request = request.text(text.to_string());
        }
        request.await?;
        Ok(())
    }

    /// Register the webhook URL. Only message and button updates are
    /// delivered.
    ///
    /// # Errors
    ///
    /// Returns `TelegramError::InvalidUrl` if `url` does not parse, or an
    /// error if the API request fails.
    #[instrument(skip(self, secret_token))]
    pub async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&SecretString>,
    ) -> Result<(), TelegramError> {
        let url = Url::parse(url).map_err(|e| TelegramError::InvalidUrl(e.to_string()))?;
        let mut request = self
            .bot
            .set_webhook(url)
            .allowed_updates([AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);
        if let Some(secret) = secret_token {
            request = request.secret_token(secret.expose_secret().to_string());
        }

        request.await?;
        debug!("Webhook registered");
        Ok(())
    }

    /// Remove the webhook.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Telegram returns an error.
    #[instrument(skip(self))]
    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        self.bot.delete_webhook().await?;
        debug!("Webhook removed");
        Ok(())
    }
}

/// Check the `X-Telegram-Bot-Api-Secret-Token` header.
///
/// With no configured secret every request passes.
///
/// # Errors
///
/// Returns `TelegramError::InvalidSecret` if a secret is configured and the
/// header is missing or different.
pub fn verify_webhook_secret(
    expected: Option<&SecretString>,
    provided: Option<&str>,
) -> Result<(), TelegramError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided {
        Some(provided) if constant_time_compare(expected.expose_secret(), provided) => Ok(()),
        _ => Err(TelegramError::InvalidSecret),
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::Uri;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_webhook_secret_not_configured() {
        assert!(verify_webhook_secret(None, None).is_ok());
        assert!(verify_webhook_secret(None, Some("anything")).is_ok());
    }

    #[test]
    fn test_webhook_secret_configured() {
        let secret = SecretString::from("s3cret-token");
        assert!(verify_webhook_secret(Some(&secret), Some("s3cret-token")).is_ok());
        assert!(matches!(
            verify_webhook_secret(Some(&secret), Some("wrong")),
            Err(TelegramError::InvalidSecret)
        ));
        assert!(matches!(
            verify_webhook_secret(Some(&secret), None),
            Err(TelegramError::InvalidSecret)
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = TelegramClient::new(
            SecretString::from("123456:ABC-secret"),
            Duration::from_secs(5),
        )
        .and_then(|c| c.with_base_url("http://localhost:9/"));
        let debug_output = format!("{client:?}");
        assert!(!debug_output.contains("ABC-secret"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("http://localhost:9\""));
    }

    #[test]
    fn test_base_url_must_parse() {
        let client =
            TelegramClient::new(SecretString::from("123456:ABC"), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.with_base_url("not a url"),
            Err(TelegramError::InvalidUrl(_))
        ));
    }

    /// Requests seen by the stand-in Bot API: lowercased method and body.
    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    async fn bot_api(State(seen): State<Seen>, uri: Uri, body: Bytes) -> Json<Value> {
        let method = uri
            .path()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let payload = serde_json::from_slice(&body).unwrap_or(Value::Null);
        seen.lock().unwrap().push((method.clone(), payload.clone()));

        match method.as_str() {
            "sendmessage" if payload["chat_id"] == json!(-404) => Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found",
            })),
            "sendmessage" | "editmessagetext" => Json(json!({
                "ok": true,
                "result": {
                    "message_id": 77,
                    "date": 1_700_000_000,
                    "chat": {"id": payload["chat_id"], "type": "group", "title": "Заказы"},
                    "text": payload["text"],
                },
            })),
            _ => Json(json!({"ok": true, "result": true})),
        }
    }

    async fn spawn_bot_api() -> (Seen, TelegramClient) {
        let seen = Seen::default();
        let app = Router::new().fallback(bot_api).with_state(Arc::clone(&seen));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = TelegramClient::new(SecretString::from("123456:ABC"), Duration::from_secs(5))
            .unwrap()
            .with_base_url(&format!("http://{addr}"))
            .unwrap();
        (seen, client)
    }

    #[tokio::test]
    async fn test_send_message_applies_markdown_and_keyboard() {
        let (seen, client) = spawn_bot_api().await;
        let message = OutgoingMessage {
            text: "*Заказ*".to_string(),
            markdown: true,
            reply_markup: Some(InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
                "Оплачен",
                "status:paid:1",
            )]])),
        };

        let sent = client.send_message(ChatId(-100), &message).await.unwrap();
        assert_eq!(sent.id, MessageId(77));

        let seen = seen.lock().unwrap();
        let (method, body) = &seen[0];
        assert_eq!(method, "sendmessage");
        assert_eq!(body["chat_id"], json!(-100));
        assert_eq!(body["parse_mode"], "MarkdownV2");
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "status:paid:1"
        );
    }

    #[tokio::test]
    async fn test_plain_message_has_no_parse_mode() {
        let (seen, client) = spawn_bot_api().await;
        let message = OutgoingMessage {
            text: "Привет!".to_string(),
            markdown: false,
            reply_markup: None,
        };

        client
            .edit_message_text(ChatId(-100), MessageId(5), &message)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let (method, body) = &seen[0];
        assert_eq!(method, "editmessagetext");
        assert_eq!(body["message_id"], json!(5));
        assert!(body.get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let (_, client) = spawn_bot_api().await;
        let message = OutgoingMessage {
            text: "x".to_string(),
            markdown: false,
            reply_markup: None,
        };

        let result = client.send_message(ChatId(-404), &message).await;
        assert!(matches!(result, Err(TelegramError::Api(_))));
    }

    #[tokio::test]
    async fn test_set_webhook_sends_secret_and_update_filter() {
        let (seen, client) = spawn_bot_api().await;
        let secret = SecretString::from("hook-secret");

        client
            .set_webhook("https://example.com/api/telegram/webhook", Some(&secret))
            .await
            .unwrap();
        assert!(matches!(
            client.set_webhook("not a url", None).await,
            Err(TelegramError::InvalidUrl(_))
        ));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (method, body) = &seen[0];
        assert_eq!(method, "setwebhook");
        assert_eq!(body["url"], "https://example.com/api/telegram/webhook");
        assert_eq!(body["secret_token"], "hook-secret");
        assert_eq!(body["allowed_updates"], json!(["message", "callback_query"]));
    }
}
