//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use poizon_core::UserId;

/// A Mini-App user, identified by their Telegram id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    /// When the user first authenticated.
    pub created_at: DateTime<Utc>,
}

/// Identity fields refreshed on every authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
}
