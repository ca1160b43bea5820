//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness
//! GET    /health/ready            - Readiness (database ping)
//!
//! # Auth (strict rate limit)
//! POST   /api/auth/verify         - Exchange initData for a session token
//!
//! # API (requires session token)
//! GET    /api/user/profile        - Profile with loyalty and history
//! GET    /api/user/address        - Saved delivery address
//! POST   /api/user/address        - Replace the saved address
//! GET    /api/orders              - Own orders, newest first
//! POST   /api/orders              - Checkout
//! GET    /api/orders/{id}/status  - Status of one own order
//! GET    /api/cart                - Cart items, newest first
//! POST   /api/cart                - Add a cart item
//! DELETE /api/cart/{id}           - Remove an own cart item
//!
//! # API (public)
//! GET    /api/rate                - Current CNY→RUB rate
//! POST   /api/calculate           - Price quote
//! GET    /api/cdek/cities         - City suggestions
//! GET    /api/cdek/pvz            - Pickup points in a city
//! GET    /api/cdek/streets        - Street suggestions in a city
//!
//! # Bot
//! POST   /api/telegram/webhook    - Telegram updates (secret header)
//! ```

pub mod auth;
pub mod cart;
pub mod cdek;
pub mod health;
pub mod orders;
pub mod rates;
pub mod telegram;
pub mod user;

use axum::{
    Router,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{delete, get, post},
};

use crate::db::Store;
use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error format.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Некорректный запрос: {}", rejection.body_text()))
    }
}

/// Path parameter extractor whose rejections use the API error format.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("Некорректный адрес: {}", rejection.body_text()))
    }
}

/// Health check routes.
pub fn health_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S>))
}

/// Create the auth routes router.
pub fn auth_routes<S: Store>() -> Router<AppState<S>> {
    Router::new().route("/verify", post(auth::verify::<S>))
}

/// Create the API routes router.
pub fn api_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/user/profile", get(user::profile::<S>))
        .route(
            "/user/address",
            get(user::get_address::<S>).post(user::save_address::<S>),
        )
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route("/orders/{id}/status", get(orders::status::<S>))
        .route("/cart", get(cart::list::<S>).post(cart::add::<S>))
        .route("/cart/{id}", delete(cart::remove::<S>))
        .route("/rate", get(rates::rate::<S>))
        .route("/calculate", post(rates::calculate::<S>))
        .route("/cdek/cities", get(cdek::cities::<S>))
        .route("/cdek/pvz", get(cdek::delivery_points::<S>))
        .route("/cdek/streets", get(cdek::streets::<S>))
}

/// Create the bot webhook router.
pub fn telegram_routes<S: Store>() -> Router<AppState<S>> {
    Router::new().route("/webhook", post(telegram::webhook::<S>))
}
