//! Session tokens issued after initData verification.
//!
//! Tokens are HS256 JWTs carrying the Telegram user id and username. Request
//! authorization trusts the claims; no database lookup is made.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use poizon_core::UserId;

use super::AuthError;

/// Session lifetime.
pub const SESSION_TTL_HOURS: i64 = 24;

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the Telegram user id as a string.
    pub sub: String,
    pub user_id: i64,
    pub username: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// The caller a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub username: Option<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: UserId::new(claims.user_id),
            username: claims.username,
        }
    }
}

/// Signing keys plus the optional developer identity.
///
/// Cheap to clone; shared by the login handler and the `RequireAuth`
/// extractor.
#[derive(Clone)]
pub struct SessionKeys {
    inner: Arc<SessionKeysInner>,
}

struct SessionKeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    dev_identity: Option<Identity>,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("keys", &"[REDACTED]")
            .field("dev_identity", &self.inner.dev_identity)
            .finish()
    }
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: &SecretString, dev_identity: Option<Identity>) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            inner: Arc::new(SessionKeysInner {
                encoding: EncodingKey::from_secret(bytes),
                decoding: DecodingKey::from_secret(bytes),
                validation,
                dev_identity,
            }),
        }
    }

    /// Identity injected when a request carries no token (development only).
    #[must_use]
    pub fn dev_identity(&self) -> Option<&Identity> {
        self.inner.dev_identity.as_ref()
    }

    /// Issue a 24-hour token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue(&self, user_id: UserId, username: Option<&str>) -> Result<String, AuthError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Issue a token as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue_at(
        &self,
        user_id: UserId,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            user_id: user_id.as_i64(),
            username: username.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.inner.encoding,
        )?)
    }

    /// Validate signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any invalid, tampered or expired token.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                AuthError::InvalidToken
            })?;

        if claims.sub != claims.user_id.to_string() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(&SecretString::from("k".repeat(16) + "Zx9!Qw7@Er5#Ty3$"), None)
    }

    #[test]
    fn test_round_trip() {
        let keys = keys();
        let token = keys.issue(UserId::new(777_000), Some("anya")).unwrap();
        let claims = keys.decode(&token).unwrap();

        assert_eq!(claims.user_id, 777_000);
        assert_eq!(claims.sub, "777000");
        assert_eq!(claims.username.as_deref(), Some("anya"));
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_HOURS * 3600);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = keys();
        let issued = Utc::now() - Duration::hours(SESSION_TTL_HOURS + 1);
        let token = keys.issue_at(UserId::new(1), None, issued).unwrap();
        assert!(matches!(keys.decode(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = keys().issue(UserId::new(1), None).unwrap();
        let other = SessionKeys::new(&SecretString::from("another-signing-key-0123456789!"), None);
        assert!(matches!(other.decode(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            keys().decode("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }
}
