//! Poizon order backend - Telegram Mini-App API and bot webhook.
//!
//! This binary serves the API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API consumed by the Mini-App
//! - Telegram initData login, HS256 session tokens
//! - `PostgreSQL` for users, addresses, orders and cart items
//! - Telegram Bot API for operator notifications and status buttons
//! - CBR exchange rate and CDEK location lookups, cached in memory

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;

use poizon_server::build_router;
use poizon_server::config::ServerConfig;
use poizon_server::db::{self, PgStore};
use poizon_server::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Start Sentry when a DSN is configured. The guard flushes events on drop.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// WARN and ERROR become Sentry events; INFO and DEBUG become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    // Sentry first, so the tracing layer has a client to report to.
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "poizon_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Some(dev) = &config.dev_identity {
        tracing::warn!(
            user_id = dev.user_id,
            "Developer identity enabled: requests without a token act as this user"
        );
    }
    if config.cdek.is_none() {
        tracing::warn!("CDEK credentials not set, carrier lookups will answer 503");
    }
    if config.telegram.webhook_secret.is_none() {
        tracing::warn!("TELEGRAM_WEBHOOK_SECRET not set, webhook requests are not authenticated");
    }

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to PostgreSQL");

    // Schema changes are applied with `poizon-cli migrate`, never here.

    let addr = config.socket_addr();
    let state = AppState::new(config, PgStore::new(pool))?;
    let app = build_router(state)?;

    tracing::info!("poizon-server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down, draining in-flight requests");
}
