//! Poizon order backend library.
//!
//! This crate provides the HTTP API for the Telegram Mini-App and the bot
//! webhook as a library, allowing it to be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cdek;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod telegram;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, header},
};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::Store;
use crate::middleware::{RateLimitConfigError, api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Error assembling the router from configuration.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    RateLimit(#[from] RateLimitConfigError),
    #[error("invalid ALLOWED_ORIGIN: {0}")]
    InvalidOrigin(#[from] header::InvalidHeaderValue),
}

/// Build the full application router.
///
/// # Errors
///
/// Returns `RouterError` if the rate limit or CORS origin is invalid.
pub fn build_router<S: Store>(state: AppState<S>) -> Result<Router, RouterError> {
    let config = state.config();

    let api = Router::new()
        .nest(
            "/auth",
            routes::auth_routes::<S>().layer(auth_rate_limiter()?),
        )
        .merge(routes::api_routes::<S>().layer(api_rate_limiter(config.rate_limit_per_minute)?))
        .nest("/telegram", routes::telegram_routes::<S>());

    let mut app = Router::new()
        .merge(routes::health_routes::<S>())
        .nest("/api", api)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        );

    if let Some(origin) = &config.allowed_origin {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(HeaderValue::from_str(origin)?)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );
    }

    Ok(app
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()))
}
