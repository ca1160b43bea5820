//! Cart: a pre-checkout staging list.

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use poizon_core::{CartItemId, ShippingMethod};

use super::{ApiJson, ApiPath};
use crate::db::{CartStore, Store};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{CartItem, NewCartItem};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub shipping: String,
    /// Final price in rubles, when the client already priced the item.
    #[serde(default)]
    pub price: Option<i64>,
    /// Listing price in CNY; when present the price is computed here.
    #[serde(default)]
    pub raw_price: Option<Decimal>,
}

/// The caller's cart, newest first.
pub async fn list<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Vec<CartItem>>> {
    Ok(Json(state.store().list_cart(identity.user_id).await?))
}

/// Add an item to the caller's cart.
pub async fn add<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
    ApiJson(request): ApiJson<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let link = request.link.trim();
    let category = request.category.trim();
    if link.is_empty() {
        return Err(AppError::BadRequest("Ссылка на товар обязательна".to_string()));
    }
    if category.is_empty() {
        return Err(AppError::BadRequest("Категория обязательна".to_string()));
    }

    let price = match (request.raw_price, request.price) {
        (Some(raw), _) => state.orders().quote(raw, &request.shipping).await?.price,
        (None, Some(price)) if price > 0 => price,
        _ => {
            return Err(AppError::BadRequest(
                "Цена должна быть больше нуля".to_string(),
            ));
        }
    };

    let item = state
        .store()
        .add_cart_item(&NewCartItem {
            user_id: identity.user_id,
            link: link.to_string(),
            category: category.to_string(),
            shipping: ShippingMethod::from_input(&request.shipping),
            price,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Remove one of the caller's cart items.
pub async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
    ApiPath(id): ApiPath<CartItemId>,
) -> Result<StatusCode> {
    if state
        .store()
        .delete_cart_item(identity.user_id, id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Товар не найден".to_string()))
    }
}
