//! Login with Telegram initData.

use axum::{Json, extract::State};
use serde::Deserialize;

use super::ApiJson;
use crate::db::Store;
use crate::error::Result;
use crate::middleware::ClientIp;
use crate::services::auth::{AuthError, LoginResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub init_data: String,
}

/// Verify initData and issue a session token.
pub async fn verify<S: Store>(
    State(state): State<AppState<S>>,
    ClientIp(client_ip): ClientIp,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> Result<Json<LoginResponse>> {
    match state.auth().login(&request.init_data).await {
        Ok(login) => Ok(Json(login)),
        Err(e) => {
            if matches!(
                e,
                AuthError::MalformedInitData(_)
                    | AuthError::InvalidSignature
                    | AuthError::InitDataExpired
            ) {
                tracing::warn!(
                    client_ip = ?client_ip,
                    error = %e,
                    "initData rejected"
                );
            }
            Err(e.into())
        }
    }
}
