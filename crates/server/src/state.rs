//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;
use thiserror::Error;

use poizon_core::UserId;

use crate::cdek::{CdekClient, CdekError};
use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::auth::{AuthService, Identity, InitDataVerifier, SessionKeys};
use crate::services::{
    CbrRateSource, ExchangeRateProvider, OrderService, ProfileService, RateError,
};
use crate::telegram::{TelegramClient, TelegramError};

/// Error building the upstream clients.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("telegram client: {0}")]
    Telegram(#[from] TelegramError),
    #[error("rate source: {0}")]
    Rates(#[from] RateError),
    #[error("cdek client: {0}")]
    Cdek(#[from] CdekError),
}

/// Order service as wired in production.
pub type Orders<S> = OrderService<S, TelegramClient, CbrRateSource>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and is generic over the
/// persistence backend so routes can be exercised against an in-memory
/// store.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S> {
    config: ServerConfig,
    store: S,
    sessions: SessionKeys,
    auth: AuthService<S>,
    orders: Orders<S>,
    profiles: ProfileService<S>,
    telegram: TelegramClient,
    cdek: Option<CdekClient>,
}

impl<S: Store> AppState<S> {
    /// Create the state, building upstream clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if an HTTP client cannot be built.
    pub fn new(config: ServerConfig, store: S) -> Result<Self, StateError> {
        let timeout = config.upstream_timeout;
        let telegram = TelegramClient::new(config.telegram.bot_token.clone(), timeout)?;
        let rate_source = CbrRateSource::new(config.rates.source_url.clone(), timeout)?;
        let cdek = config
            .cdek
            .clone()
            .map(|cdek| CdekClient::new(cdek, timeout))
            .transpose()?;

        Ok(Self::with_clients(config, store, telegram, rate_source, cdek))
    }

    /// Create the state from pre-built upstream clients.
    #[must_use]
    pub fn with_clients(
        config: ServerConfig,
        store: S,
        telegram: TelegramClient,
        rate_source: CbrRateSource,
        cdek: Option<CdekClient>,
    ) -> Self {
        let dev_identity = config.dev_identity.as_ref().map(|dev| Identity {
            user_id: UserId::new(dev.user_id),
            username: dev.username.clone(),
        });
        let sessions = SessionKeys::new(&config.jwt_secret, dev_identity);
        let verifier = InitDataVerifier::new(&config.telegram.bot_token, config.init_data_max_age);
        let auth = AuthService::new(store.clone(), verifier, sessions.clone());

        let rates = Arc::new(ExchangeRateProvider::from_config(rate_source, &config.rates));
        let orders = OrderService::new(
            store.clone(),
            telegram.clone(),
            rates,
            config.pricing,
            config.telegram.admin_chat_id,
        );
        let profiles = ProfileService::new(store.clone(), config.telegram.bot_username.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                sessions,
                auth,
                orders,
                profiles,
                telegram,
                cdek,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the persistence backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionKeys {
        &self.inner.sessions
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService<S> {
        &self.inner.auth
    }

    #[must_use]
    pub fn orders(&self) -> &Orders<S> {
        &self.inner.orders
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileService<S> {
        &self.inner.profiles
    }

    /// Get a reference to the Bot API client.
    #[must_use]
    pub fn telegram(&self) -> &TelegramClient {
        &self.inner.telegram
    }

    /// The CDEK client, if credentials are configured.
    #[must_use]
    pub fn cdek(&self) -> Option<&CdekClient> {
        self.inner.cdek.as_ref()
    }
}

impl<S: Store> FromRef<AppState<S>> for SessionKeys {
    fn from_ref(state: &AppState<S>) -> Self {
        state.sessions().clone()
    }
}
