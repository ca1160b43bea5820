//! Authentication service.
//!
//! Mini-App users authenticate once with Telegram-signed initData and then
//! present the issued session token on every request:
//!
//! 1. [`InitDataVerifier`] checks the initData HMAC
//! 2. the user row is upserted with the latest Telegram names
//! 3. [`SessionKeys`] issues a 24-hour token bound to `{user_id, username}`

mod error;
mod init_data;
mod session;

pub use error::AuthError;
#[cfg(any(test, feature = "test-support"))]
pub use init_data::sign_init_data;
pub use init_data::{InitDataVerifier, TelegramUser, VerifiedInitData};
pub use session::{Claims, Identity, SESSION_TTL_HOURS, SessionKeys};

use serde::Serialize;
use tracing::instrument;

use poizon_core::UserId;

use crate::db::UserStore;
use crate::models::{NewUser, User};

/// Successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    store: S,
    verifier: InitDataVerifier,
    sessions: SessionKeys,
}

impl<S: UserStore> AuthService<S> {
    #[must_use]
    pub const fn new(store: S, verifier: InitDataVerifier, sessions: SessionKeys) -> Self {
        Self {
            store,
            verifier,
            sessions,
        }
    }

    /// Verify initData, upsert the user and issue a session token.
    ///
    /// # Errors
    ///
    /// Returns the verifier's errors for bad initData,
    /// `AuthError::Repository` if the upsert fails, or
    /// `AuthError::TokenEncoding` if the token cannot be signed.
    #[instrument(skip(self, init_data))]
    pub async fn login(&self, init_data: &str) -> Result<LoginResponse, AuthError> {
        let verified = self.verifier.verify(init_data)?;
        let telegram = verified.user;

        let user = self
            .store
            .upsert_user(&NewUser {
                id: UserId::new(telegram.id),
                username: telegram.username,
                first_name: telegram.first_name,
            })
            .await?;

        let token = self.sessions.issue(user.id, user.username.as_deref())?;
        tracing::info!(user_id = %user.id, "User authenticated");

        Ok(LoginResponse { token, user })
    }
}
