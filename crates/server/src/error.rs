//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; the body is always JSON `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cdek::CdekError;
use crate::db::RepositoryError;
use crate::services::CheckoutError;
use crate::services::auth::AuthError;
use crate::telegram::TelegramError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout or price quote failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// CDEK API operation failed.
    #[error("CDEK error: {0}")]
    Cdek(#[from] CdekError),

    /// Webhook request could not be authenticated.
    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),

    /// CDEK credentials are not configured.
    #[error("Carrier integration is not configured")]
    CarrierUnavailable,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::MalformedInitData(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidSignature
                | AuthError::InitDataExpired
                | AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::FORBIDDEN,
                AuthError::TokenEncoding(_) | AuthError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_) | CheckoutError::Pricing(_) => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::PublicIdExhausted => StatusCode::CONFLICT,
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cdek(_) => StatusCode::BAD_GATEWAY,
            Self::Telegram(err) => match err {
                TelegramError::InvalidSecret => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::CarrierUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Client-facing message. Internal and upstream details are never exposed.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Внутренняя ошибка сервера".to_string(),
            Self::Auth(err) => match err {
                AuthError::MalformedInitData(_) => "Некорректные данные авторизации".to_string(),
                AuthError::InvalidSignature => "Неверная подпись данных".to_string(),
                AuthError::InitDataExpired => "Данные авторизации устарели".to_string(),
                AuthError::MissingToken => "Требуется авторизация".to_string(),
                AuthError::InvalidToken => "Сессия недействительна".to_string(),
                AuthError::TokenEncoding(_) | AuthError::Repository(_) => {
                    "Внутренняя ошибка сервера".to_string()
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::Validation(msg) => msg.clone(),
                CheckoutError::Pricing(_) => "Некорректная цена".to_string(),
                CheckoutError::PublicIdExhausted => {
                    "Не удалось создать заказ, попробуйте ещё раз".to_string()
                }
                CheckoutError::Repository(_) => "Внутренняя ошибка сервера".to_string(),
            },
            Self::Cdek(_) => "Сервис доставки временно недоступен".to_string(),
            Self::Telegram(TelegramError::InvalidSecret) => "Доступ запрещён".to_string(),
            Self::Telegram(_) => "Внешний сервис недоступен".to_string(),
            Self::CarrierUnavailable => "Доставка СДЭК не настроена".to_string(),
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::RateLimited => "Слишком много запросов".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}
