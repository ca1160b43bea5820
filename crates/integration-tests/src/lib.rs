//! Integration tests for the Poizon order backend.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process router tests (no services required)
//! cargo test -p poizon-integration-tests
//!
//! # Smoke tests against a running server
//! POIZON_BASE_URL=http://localhost:3000 cargo test -p poizon-integration-tests -- --ignored
//! ```
//!
//! [`TestApp`] wires the real router to an in-memory store. Telegram and the
//! rate source point at a closed local port, so notifications fail (and are
//! logged) and the rate falls back to the configured value.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use poizon_core::PricingConfig;
use poizon_server::build_router;
use poizon_server::config::{AppEnv, RateConfig, ServerConfig, TelegramConfig};
use poizon_server::db::MemoryStore;
use poizon_server::services::CbrRateSource;
use poizon_server::services::auth::sign_init_data;
use poizon_server::state::AppState;
use poizon_server::telegram::TelegramClient;

pub const BOT_TOKEN: &str = "123456:AAH-integration-bot-token";
pub const ADMIN_CHAT_ID: i64 = -100_500;
pub const WEBHOOK_SECRET: &str = "integration-webhook-secret";
/// Header carrying the webhook secret.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Nothing listens on the discard port.
const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Configuration with every upstream pointing nowhere.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/poizon_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        app_env: AppEnv::Development,
        jwt_secret: SecretString::from("integration-jwt-secret-Zq81vLm2Xr7Tn4Wb"),
        telegram: TelegramConfig {
            bot_token: SecretString::from(BOT_TOKEN),
            bot_username: Some("poizon_order_bot".to_string()),
            admin_chat_id: ADMIN_CHAT_ID,
            webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
        },
        web_app_url: Some("https://app.example.com".to_string()),
        allowed_origin: None,
        rate_limit_per_minute: 1000,
        pricing: PricingConfig::default(),
        rates: RateConfig {
            source_url: format!("{UNREACHABLE}/daily_json.js"),
            ..RateConfig::default()
        },
        cdek: None,
        upstream_timeout: Duration::from_secs(2),
        init_data_max_age: None,
        dev_identity: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// The router over an in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    /// Sent as `X-Forwarded-For` so the rate limiter has a key.
    client_ip: String,
}

impl TestApp {
    /// Build with [`test_config`].
    ///
    /// # Panics
    ///
    /// Panics if a client or the router cannot be built.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Build with a custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if a client or the router cannot be built.
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        let store = MemoryStore::new();
        let telegram = TelegramClient::new(config.telegram.bot_token.clone(), config.upstream_timeout)
            .and_then(|client| client.with_base_url(UNREACHABLE))
            .expect("Failed to build Telegram client");
        let rates = CbrRateSource::new(config.rates.source_url.clone(), config.upstream_timeout)
            .expect("Failed to build rate source");

        let state = AppState::with_clients(config, store.clone(), telegram, rates, None);
        let router = build_router(state).expect("Failed to build router");

        Self {
            router,
            store,
            client_ip: "203.0.113.7".to_string(),
        }
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty).
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body is not JSON.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("x-forwarded-for", &self.client_ip);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.send(request).await
    }

    /// Deliver a webhook update with the given secret header.
    ///
    /// # Panics
    ///
    /// Panics if the router fails.
    pub async fn webhook(&self, secret: Option<&str>, update: &Value) -> StatusCode {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/telegram/webhook")
            .header("x-forwarded-for", &self.client_ip)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        let request = builder
            .body(Body::from(update.to_string()))
            .expect("Failed to build request");

        self.send(request).await.0
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };
        (status, json)
    }

    /// Log in as a Telegram user and return the session token.
    ///
    /// # Panics
    ///
    /// Panics if the login is rejected.
    pub async fn login(&self, user_id: i64, username: &str) -> String {
        let user = serde_json::json!({
            "id": user_id,
            "username": username,
            "first_name": "Тест",
        })
        .to_string();
        let init_data = sign_init_data(
            BOT_TOKEN,
            &[("user", user.as_str()), ("auth_date", "1700000000")],
        );

        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/verify",
                None,
                Some(serde_json::json!({ "initData": init_data })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"]
            .as_str()
            .expect("login response has no token")
            .to_string()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A valid pickup checkout body for a 100 CNY air-shipped item.
#[must_use]
pub fn pickup_checkout() -> Value {
    serde_json::json!({
        "rawPoizonPrice": 100,
        "shipping": "air",
        "link": "https://dw4.co/t/A/1abc",
        "category": "Обувь",
        "deliveryType": "pickup",
        "city": "Москва",
        "fullName": "Иванов Иван",
        "phone": "+79990000000",
        "pickupCode": "MSK123",
        "pickupAddress": "ул. Тверская, 1",
    })
}

/// A callback query update: a button with `data` pressed under an order
/// notification in `chat_id`.
#[must_use]
pub fn callback_update(chat_id: i64, data: &str) -> Value {
    serde_json::json!({
        "update_id": 1,
        "callback_query": {
            "id": "cb-1",
            "from": { "id": 7, "is_bot": false, "first_name": "Оператор", "username": "operator" },
            "message": {
                "message_id": 99,
                "date": 1_700_000_000,
                "chat": { "id": chat_id, "type": "group", "title": "Заказы" },
                "text": "Заказ",
            },
            "chat_instance": "-42",
            "data": data,
        },
    })
}
