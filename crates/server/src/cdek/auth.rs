//! CDEK OAuth client-credentials token.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::CdekError;
use super::types::{ErrorResponse, TokenResponse};
use crate::config::CdekConfig;

/// Cache lifetime; CDEK tokens are valid for 60 minutes.
pub const TOKEN_TTL: Duration = Duration::from_secs(58 * 60);
/// Safety margin subtracted from a shorter `expires_in`.
const EXPIRY_MARGIN: Duration = Duration::from_secs(120);

/// A token together with how long it may be reused.
#[derive(Clone)]
struct CachedToken {
    token: SecretString,
    ttl: Duration,
}

/// Expires each token after its own lifetime.
struct TokenExpiry;

impl Expiry<(), CachedToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &(),
        value: &CachedToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Fetches and caches the CDEK access token.
pub struct CdekTokenProvider {
    client: reqwest::Client,
    config: CdekConfig,
    cache: Cache<(), CachedToken>,
}

impl std::fmt::Debug for CdekTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdekTokenProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CdekTokenProvider {
    #[must_use]
    pub fn new(client: reqwest::Client, config: CdekConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .expire_after(TokenExpiry)
            .build();
        Self {
            client,
            config,
            cache,
        }
    }

    /// The cached token, fetching a new one when stale.
    ///
    /// Returns `None` when the token endpoint fails; there is no fallback
    /// token, so callers must fail their request. Concurrent callers share
    /// one token request.
    pub async fn token(&self) -> Option<SecretString> {
        match self.cache.try_get_with((), self.fetch_token()).await {
            Ok(cached) => Some(cached.token),
            Err(e) => {
                tracing::warn!(error = %e, "CDEK token request failed");
                None
            }
        }
    }

    /// Forget the cached token (e.g. after a 401).
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }

    #[instrument(skip(self))]
    async fn fetch_token(&self) -> Result<CachedToken, CdekError> {
        let url = format!("{}/oauth/token", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            return Err(CdekError::Api {
                status,
                message: body
                    .summary()
                    .unwrap_or_else(|| "token request rejected".to_string()),
            });
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = ?token.expires_in, "CDEK token obtained");
        Ok(CachedToken {
            token: SecretString::from(token.access_token),
            ttl: token_ttl(token.expires_in),
        })
    }
}

/// 58 minutes, or `expires_in` minus a margin when that is shorter.
fn token_ttl(expires_in: Option<u64>) -> Duration {
    expires_in
        .map(Duration::from_secs)
        .map_or(TOKEN_TTL, |lifetime| {
            lifetime.saturating_sub(EXPIRY_MARGIN).min(TOKEN_TTL)
        })
}
