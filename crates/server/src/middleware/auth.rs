//! Session authentication extractor.
//!
//! Protected handlers take [`RequireAuth`], which reads the bearer token from
//! the `Authorization` header and yields the caller's [`Identity`].

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, Identity, SessionKeys};

/// Extractor that requires a valid session token.
///
/// - no token: 401, unless a developer identity is configured, in which case
///   that identity is used
/// - invalid or expired token: 403
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(identity): RequireAuth) -> String {
///     format!("Hello, {}!", identity.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    SessionKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);

        let Some(token) = bearer_token(parts) else {
            if let Some(identity) = keys.dev_identity() {
                tracing::debug!(user_id = %identity.user_id, "Using developer identity");
                return Ok(Self(identity.clone()));
            }
            return Err(AuthError::MissingToken.into());
        };

        let identity = Identity::from(keys.decode(token)?);
        set_sentry_user(&identity.user_id, identity.username.as_deref());
        Ok(Self(identity))
    }
}

/// The token from `Authorization: Bearer <token>`, if present and non-empty.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
