//! Order placement and history.

use axum::{Json, extract::State, http::StatusCode};

use poizon_core::OrderId;

use super::{ApiJson, ApiPath};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::{CheckoutRequest, CheckoutResponse, OrderStatusView};
use crate::state::AppState;

/// The caller's orders, newest first.
pub async fn list<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_orders(identity.user_id).await?))
}

/// Checkout.
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let placed = state.orders().checkout(&identity, request).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// Status of one of the caller's orders.
pub async fn status<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<OrderStatusView>> {
    state
        .orders()
        .order_status(identity.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Заказ не найден".to_string()))
}
