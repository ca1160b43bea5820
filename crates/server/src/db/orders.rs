//! Order repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use poizon_core::{DeliveryType, OrderId, OrderStatus, PublicId, ShippingMethod, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{NewOrder, Order};

const ORDER_COLUMNS: &str = "id, public_id, user_id, username, link, category, shipping, price, \
     raw_poizon_price, status, delivery_type, city, street, full_name, phone, \
     pickup_code, pickup_address, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    public_id: String,
    user_id: UserId,
    username: Option<String>,
    link: String,
    category: String,
    shipping: String,
    price: i64,
    raw_poizon_price: Decimal,
    status: String,
    delivery_type: String,
    city: String,
    street: Option<String>,
    full_name: String,
    phone: String,
    pickup_code: Option<String>,
    pickup_address: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let public_id = PublicId::parse(&row.public_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid public id in database: {e}"))
        })?;
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(RepositoryError::DataCorruption)?;
        let delivery_type = row
            .delivery_type
            .parse::<DeliveryType>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            public_id,
            user_id: row.user_id,
            username: row.username,
            link: row.link,
            category: row.category,
            shipping: ShippingMethod::from_input(&row.shipping),
            price: row.price,
            raw_poizon_price: row.raw_poizon_price,
            status,
            delivery_type,
            city: row.city,
            street: row.street,
            full_name: row.full_name,
            phone: row.phone,
            pickup_code: row.pickup_code,
            pickup_address: row.pickup_address,
            created_at: row.created_at,
        })
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new order with status `pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the public id already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO customer_order (
                public_id, user_id, username, link, category, shipping, price,
                raw_poizon_price, status, delivery_type, city, street, full_name,
                phone, pickup_code, pickup_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {ORDER_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order.public_id.as_str())
            .bind(order.user_id)
            .bind(&order.username)
            .bind(&order.link)
            .bind(&order.category)
            .bind(order.shipping.as_str())
            .bind(order.price)
            .bind(order.raw_poizon_price)
            .bind(OrderStatus::Pending.as_str())
            .bind(order.delivery_type.as_str())
            .bind(&order.city)
            .bind(&order.street)
            .bind(&order.full_name)
            .bind(&order.phone)
            .bind(&order.pickup_code)
            .bind(&order.pickup_address)
            .fetch_one(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "public id"))?;

        row.try_into()
    }

    /// Get an order by its internal id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored enum value is invalid.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Compare-and-set the status column.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "UPDATE customer_order SET status = $3 \
             WHERE id = $1 AND status = $2 RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }
}
