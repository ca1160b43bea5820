//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// initData is missing a required field or cannot be parsed.
    #[error("malformed init data: {0}")]
    MalformedInitData(String),

    /// initData hash does not match its contents.
    #[error("invalid init data signature")]
    InvalidSignature,

    /// initData `auth_date` is older than the allowed age.
    #[error("init data expired")]
    InitDataExpired,

    /// No bearer token on a protected request.
    #[error("missing session token")]
    MissingToken,

    /// Session token failed signature or expiry validation.
    #[error("invalid session token")]
    InvalidToken,

    /// Session token could not be signed.
    #[error("token encoding error: {0}")]
    TokenEncoding(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
