//! Cart items: a pre-checkout staging list, not linked to orders.

use chrono::{DateTime, Utc};
use serde::Serialize;

use poizon_core::{CartItemId, ShippingMethod, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub link: String,
    pub category: String,
    pub shipping: ShippingMethod,
    /// Price in whole rubles.
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub user_id: UserId,
    pub link: String,
    pub category: String,
    pub shipping: ShippingMethod,
    pub price: i64,
}
