//! CDEK location lookups for the checkout form.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::cdek::{CdekClient, City, DeliveryPoint};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Queries shorter than this return no suggestions.
const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Deserialize)]
pub struct CitiesQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct PointsQuery {
    #[serde(default)]
    pub city_code: String,
}

#[derive(Debug, Deserialize)]
pub struct StreetsQuery {
    #[serde(default)]
    pub city_code: String,
    #[serde(default)]
    pub q: String,
}

fn client<S: Store>(state: &AppState<S>) -> Result<&CdekClient> {
    state.cdek().ok_or(AppError::CarrierUnavailable)
}

fn require_city_code(city_code: &str) -> Result<&str> {
    let city_code = city_code.trim();
    if city_code.is_empty() {
        return Err(AppError::BadRequest("Не указан код города".to_string()));
    }
    Ok(city_code)
}

/// City suggestions.
pub async fn cities<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<CitiesQuery>,
) -> Result<Json<Vec<City>>> {
    let client = client(&state)?;
    if query.q.trim().chars().count() < MIN_QUERY_CHARS {
        return Ok(Json(Vec::new()));
    }
    let cities = client.cities(&query.q).await?;
    Ok(Json(cities.as_ref().clone()))
}

/// Pickup points in a city.
pub async fn delivery_points<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<PointsQuery>,
) -> Result<Json<Vec<DeliveryPoint>>> {
    let client = client(&state)?;
    let city_code = require_city_code(&query.city_code)?;
    let points = client.delivery_points(city_code).await?;
    Ok(Json(points.as_ref().clone()))
}

/// Street suggestions in a city.
pub async fn streets<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<StreetsQuery>,
) -> Result<Json<Vec<String>>> {
    let client = client(&state)?;
    let city_code = require_city_code(&query.city_code)?;
    if query.q.trim().chars().count() < MIN_QUERY_CHARS {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(client.streets(city_code, &query.q).await?))
}
