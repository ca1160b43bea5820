//! CDEK carrier API client.
//!
//! Read-only lookups used by the checkout form: city search, pickup points
//! in a city, and street suggestions derived from pickup point addresses.
//!
//! # Architecture
//!
//! - OAuth client-credentials token cached in `moka` for 58 minutes, or
//!   `expires_in` minus two minutes when that is shorter
//! - Lookup responses cached in `moka` (1 hour, 1000 entries)
//! - Optional integration: without credentials the routes answer 503

pub mod auth;
pub mod client;
pub mod types;

pub use auth::CdekTokenProvider;
pub use client::CdekClient;
pub use types::{City, DeliveryPoint, PointLocation};

use thiserror::Error;

/// Errors that can occur when calling the CDEK API.
#[derive(Debug, Error)]
pub enum CdekError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CDEK answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// No access token could be obtained.
    #[error("No access token - CDEK authentication failed")]
    NoAccessToken,
}
