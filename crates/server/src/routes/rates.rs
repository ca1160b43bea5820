//! Exchange rate and price quotes.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::db::Store;
use crate::error::Result;
use crate::services::Quote;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RateResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    /// Listing price in CNY.
    pub price: Decimal,
    #[serde(default)]
    pub shipping: String,
}

/// Current marked-up CNY→RUB rate.
pub async fn rate<S: Store>(State(state): State<AppState<S>>) -> Json<RateResponse> {
    Json(RateResponse {
        rate: state.orders().current_rate().await,
    })
}

/// Price an item with the server formula.
pub async fn calculate<S: Store>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<CalculateRequest>,
) -> Result<Json<Quote>> {
    Ok(Json(
        state
            .orders()
            .quote(request.price, &request.shipping)
            .await?,
    ))
}
