//! Bot webhook.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use teloxide::types::{Message, Update, UpdateKind};

use crate::db::Store;
use crate::error::Result;
use crate::middleware::ClientIp;
use crate::services::CallbackOutcome;
use crate::state::AppState;
use crate::telegram::{build_start_reply, verify_webhook_secret};

/// Header Telegram sets to the secret registered with `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Receive a Telegram update.
///
/// Once the secret is verified the answer is always 200, so Telegram does
/// not redeliver updates that failed for reasons a retry cannot fix.
pub async fn webhook<S: Store>(
    State(state): State<AppState<S>>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_webhook_secret(state.config().telegram.webhook_secret.as_ref(), provided)
    {
        tracing::warn!(client_ip = ?client_ip, "Webhook secret mismatch");
        return Err(e.into());
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring undecodable update");
            return Ok(StatusCode::OK);
        }
    };

    match update.kind {
        UpdateKind::CallbackQuery(callback) => {
            match state.orders().apply_status_callback(&callback).await {
                Ok(CallbackOutcome::Updated { order_id, status }) => {
                    tracing::debug!(%order_id, %status, "Status callback applied");
                }
                Ok(outcome) => tracing::debug!(?outcome, "Status callback not applied"),
                Err(e) => tracing::error!(error = %e, "Status callback failed"),
            }
        }
        UpdateKind::Message(message) => handle_message(&state, &message).await,
        _ => tracing::debug!("Ignoring unhandled update kind"),
    }

    Ok(StatusCode::OK)
}

async fn handle_message<S: Store>(state: &AppState<S>, message: &Message) {
    let is_start = message
        .text()
        .and_then(|text| text.split_whitespace().next())
        .is_some_and(|command| command == "/start" || command.starts_with("/start@"));
    if !is_start {
        return;
    }

    let reply = build_start_reply(state.config().web_app_url.as_deref());
    if let Err(e) = state.telegram().send_message(message.chat.id, &reply).await {
        tracing::error!(error = %e, chat_id = message.chat.id.0, "Failed to answer /start");
    }
}
