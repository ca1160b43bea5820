//! Cart repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use poizon_core::{CartItemId, ShippingMethod, UserId};

use super::RepositoryError;
use crate::models::{CartItem, NewCartItem};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    user_id: UserId,
    link: String,
    category: String,
    shipping: String,
    price: i64,
    created_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            link: row.link,
            category: row.category,
            shipping: ShippingMethod::from_input(&row.shipping),
            price: row.price,
            created_at: row.created_at,
        }
    }
}

/// Repository for cart items.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's cart, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, link, category, shipping, price, created_at
            FROM cart_item
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add an item to a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO cart_item (user_id, link, category, shipping, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, link, category, shipping, price, created_at
            ",
        )
        .bind(item.user_id)
        .bind(&item.link)
        .bind(&item.category)
        .bind(item.shipping.as_str())
        .bind(item.price)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete an item owned by `user_id`.
    ///
    /// Returns `true` if the item was deleted, `false` if it did not exist or
    /// belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user_id: UserId, id: CartItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_item
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
