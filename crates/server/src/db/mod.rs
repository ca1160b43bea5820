//! Persistence for users, addresses, orders and cart items.
//!
//! # Tables
//!
//! - `app_user` - Telegram users, upserted on every authentication
//! - `user_address` - One saved delivery address per user
//! - `customer_order` - Placed orders; `public_id` is unique
//! - `cart_item` - Pre-checkout staging list
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p poizon-cli -- migrate
//! ```
//!
//! Services depend on the store traits below rather than on `PgPool`
//! directly. [`PgStore`] is the production implementation; `MemoryStore`
//! (feature `test-support`) backs tests.

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use poizon_core::{CartItemId, OrderId, OrderStatus, UserId};

use crate::models::{Address, CartItem, NewCartItem, NewOrder, NewUser, Order, User};

pub mod addresses;
pub mod cart;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod orders;
pub mod users;

pub use addresses::AddressRepository;
pub use cart::CartRepository;
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
pub use orders::OrderRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate public order id).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Store traits
// =============================================================================

pub trait UserStore: Send + Sync {
    /// Insert the user or refresh `username`/`first_name`.
    fn upsert_user(
        &self,
        user: &NewUser,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn get_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;
}

pub trait AddressStore: Send + Sync {
    fn get_address(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Address>, RepositoryError>> + Send;

    /// Replace the user's address wholesale and return what was stored.
    fn save_address(
        &self,
        user_id: UserId,
        address: &Address,
    ) -> impl Future<Output = Result<Address, RepositoryError>> + Send;
}

pub trait OrderStore: Send + Sync {
    /// Insert a new `pending` order.
    ///
    /// Returns `RepositoryError::Conflict` when the public id is taken.
    fn insert_order(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// All orders of a user, newest first.
    fn list_orders(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Set `status` to `to` only if it is still `from`.
    ///
    /// Returns `None` when the order is missing or its status changed
    /// concurrently. No other column is touched.
    fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;
}

pub trait CartStore: Send + Sync {
    /// Cart items of a user, newest first.
    fn list_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<CartItem>, RepositoryError>> + Send;

    fn add_cart_item(
        &self,
        item: &NewCartItem,
    ) -> impl Future<Output = Result<CartItem, RepositoryError>> + Send;

    /// Delete an item only if it belongs to `user_id`.
    ///
    /// Returns whether a row was deleted.
    fn delete_cart_item(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: UserStore + AddressStore + OrderStore + CartStore + Clone + 'static {
    /// Cheap connectivity probe for readiness checks.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Map a unique violation to `RepositoryError::Conflict`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// `PostgreSQL`-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl UserStore for PgStore {
    async fn upsert_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).upsert(user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_id(id).await
    }
}

impl AddressStore for PgStore {
    async fn get_address(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        AddressRepository::new(&self.pool).get(user_id).await
    }

    async fn save_address(
        &self,
        user_id: UserId,
        address: &Address,
    ) -> Result<Address, RepositoryError> {
        AddressRepository::new(&self.pool)
            .upsert(user_id, address)
            .await
    }
}

impl OrderStore for PgStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool).create(order).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get_by_id(id).await
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).list_for_user(user_id).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .update_status(id, from, to)
            .await
    }
}

impl CartStore for PgStore {
    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        CartRepository::new(&self.pool).list_for_user(user_id).await
    }

    async fn add_cart_item(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        CartRepository::new(&self.pool).create(item).await
    }

    async fn delete_cart_item(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        CartRepository::new(&self.pool).delete(user_id, id).await
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
