//! Profile and saved address.

use axum::{Json, extract::State};

use super::ApiJson;
use crate::db::{AddressStore, Store};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Address;
use crate::services::Profile;
use crate::state::AppState;

/// The caller's profile.
pub async fn profile<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Profile>> {
    Ok(Json(state.profiles().profile(&identity).await?))
}

/// The caller's saved address, or `null`.
pub async fn get_address<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Option<Address>>> {
    Ok(Json(state.store().get_address(identity.user_id).await?))
}

/// Replace the caller's saved address.
pub async fn save_address<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(identity): RequireAuth,
    ApiJson(address): ApiJson<Address>,
) -> Result<Json<Address>> {
    let address = address.normalized();
    address.validate().map_err(AppError::BadRequest)?;

    let saved = state
        .store()
        .save_address(identity.user_id, &address)
        .await?;
    tracing::info!(user_id = %identity.user_id, "Address saved");
    Ok(Json(saved))
}
