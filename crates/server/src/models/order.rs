//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use poizon_core::{DeliveryType, OrderId, OrderStatus, PublicId, ShippingMethod, UserId};

/// A placed order. Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Internal database id, used in operator callbacks.
    pub id: OrderId,
    /// Customer-facing code.
    pub public_id: PublicId,
    pub user_id: UserId,
    pub username: Option<String>,
    /// Poizon product link.
    pub link: String,
    pub category: String,
    pub shipping: ShippingMethod,
    /// Final price in whole rubles.
    pub price: i64,
    /// Listing price in CNY.
    #[serde(with = "rust_decimal::serde::float")]
    pub raw_poizon_price: Decimal,
    pub status: OrderStatus,
    pub delivery_type: DeliveryType,
    pub city: String,
    pub street: Option<String>,
    pub full_name: String,
    pub phone: String,
    pub pickup_code: Option<String>,
    pub pickup_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting an order. Status always starts at `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub public_id: PublicId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub link: String,
    pub category: String,
    pub shipping: ShippingMethod,
    pub price: i64,
    pub raw_poizon_price: Decimal,
    pub delivery_type: DeliveryType,
    pub city: String,
    pub street: Option<String>,
    pub full_name: String,
    pub phone: String,
    pub pickup_code: Option<String>,
    pub pickup_address: Option<String>,
}
