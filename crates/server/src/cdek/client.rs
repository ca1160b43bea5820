//! CDEK REST API client.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::auth::CdekTokenProvider;
use super::types::{City, DeliveryPoint, ErrorResponse, streets_from_points};
use super::CdekError;
use crate::config::CdekConfig;

/// Maximum number of suggestions returned by city and street lookups.
const SUGGESTION_LIMIT: usize = 10;
/// Street suggestions are derived locally, so more can be returned.
const STREET_LIMIT: usize = 20;

/// Cached lookup results.
#[derive(Debug, Clone)]
enum CacheValue {
    Cities(Arc<Vec<City>>),
    Points(Arc<Vec<DeliveryPoint>>),
}

/// Client for CDEK location and pickup point lookups.
///
/// Responses are cached for one hour.
#[derive(Clone)]
pub struct CdekClient {
    inner: Arc<CdekClientInner>,
}

struct CdekClientInner {
    client: reqwest::Client,
    api_url: String,
    tokens: CdekTokenProvider,
    cache: Cache<String, CacheValue>,
}

impl std::fmt::Debug for CdekClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdekClient")
            .field("api_url", &self.inner.api_url)
            .finish_non_exhaustive()
    }
}

impl CdekClient {
    /// Create a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns `CdekError::Http` if the HTTP client cannot be built.
    pub fn new(config: CdekConfig, timeout: Duration) -> Result<Self, CdekError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(3600)) // 1 hour
            .build();

        Ok(Self {
            inner: Arc::new(CdekClientInner {
                api_url: config.api_url.trim_end_matches('/').to_string(),
                tokens: CdekTokenProvider::new(client.clone(), config),
                client,
                cache,
            }),
        })
    }

    /// Authenticated GET returning JSON.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CdekError> {
        let token = self
            .inner
            .tokens
            .token()
            .await
            .ok_or(CdekError::NoAccessToken)?;

        let response = self
            .inner
            .client
            .get(format!("{}{path}", self.inner.api_url))
            .bearer_auth(token.expose_secret())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.inner.tokens.invalidate().await;
        }
        if !status.is_success() {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            return Err(CdekError::Api {
                status,
                message: body.summary().unwrap_or_else(|| status.to_string()),
            });
        }

        Ok(response.json().await?)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Search Russian cities by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available or the API request fails.
    #[instrument(skip(self))]
    pub async fn cities(&self, query: &str) -> Result<Arc<Vec<City>>, CdekError> {
        let query = query.trim();
        let cache_key = format!("cities:{}", query.to_lowercase());
        if let Some(CacheValue::Cities(cities)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for cities");
            return Ok(cities);
        }

        let size = SUGGESTION_LIMIT.to_string();
        let cities: Vec<City> = self
            .get_json(
                "/location/cities",
                &[("city", query), ("country_codes", "RU"), ("size", &size)],
            )
            .await?;

        let cities = Arc::new(cities);
        self.inner
            .cache
            .insert(cache_key, CacheValue::Cities(Arc::clone(&cities)))
            .await;
        Ok(cities)
    }

    /// Pickup points (`PVZ`) in a city.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available or the API request fails.
    #[instrument(skip(self))]
    pub async fn delivery_points(
        &self,
        city_code: &str,
    ) -> Result<Arc<Vec<DeliveryPoint>>, CdekError> {
        let cache_key = format!("pvz:{city_code}");
        if let Some(CacheValue::Points(points)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for delivery points");
            return Ok(points);
        }

        let points: Vec<DeliveryPoint> = self
            .get_json(
                "/deliverypoints",
                &[("city_code", city_code), ("type", "PVZ")],
            )
            .await?;

        let points = Arc::new(points);
        self.inner
            .cache
            .insert(cache_key, CacheValue::Points(Arc::clone(&points)))
            .await;
        Ok(points)
    }

    /// Street names in a city matching `query`, taken from pickup point
    /// addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the pickup point lookup fails.
    #[instrument(skip(self))]
    pub async fn streets(&self, city_code: &str, query: &str) -> Result<Vec<String>, CdekError> {
        let points = self.delivery_points(city_code).await?;
        Ok(streets_from_points(&points, query, STREET_LIMIT))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use secrecy::SecretString;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    /// Stand-in for the CDEK API, counting requests.
    #[derive(Default)]
    struct Upstream {
        token_calls: AtomicUsize,
        lookup_calls: AtomicUsize,
        reject_token: AtomicBool,
        reject_next_lookup: AtomicBool,
    }

    async fn token(State(upstream): State<Arc<Upstream>>) -> Response {
        if upstream.reject_token.load(Ordering::SeqCst) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"errors": [{"code": "v2_invalid_client", "message": "bad client"}]})),
            )
                .into_response();
        }
        let n = upstream.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({"access_token": format!("tok-{n}"), "expires_in": 3600})).into_response()
    }

    async fn cities(State(upstream): State<Arc<Upstream>>, headers: HeaderMap) -> Response {
        upstream.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let current = format!("Bearer tok-{}", upstream.token_calls.load(Ordering::SeqCst));
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == current);
        if !authorized || upstream.reject_next_lookup.swap(false, Ordering::SeqCst) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(json!([{"code": 44, "city": "Москва", "region": "Москва", "country_code": "RU"}]))
            .into_response()
    }

    async fn spawn_upstream() -> (Arc<Upstream>, CdekClient) {
        let upstream = Arc::new(Upstream::default());
        let app = Router::new()
            .route("/oauth/token", post(token))
            .route("/location/cities", get(cities))
            .with_state(Arc::clone(&upstream));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = CdekConfig {
            api_url: format!("http://{addr}/"),
            client_id: "client".to_string(),
            client_secret: SecretString::from("secret"),
        };
        let client = CdekClient::new(config, Duration::from_secs(5)).unwrap();
        (upstream, client)
    }

    #[tokio::test]
    async fn test_cities_are_cached_per_normalized_query() {
        let (upstream, client) = spawn_upstream().await;

        let first = client.cities("Моск").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].code, 44);

        let second = client.cities("  моск ").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(upstream.lookup_calls.load(Ordering::SeqCst), 1);
        assert_eq!(upstream.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_is_reused_across_lookups() {
        let (upstream, client) = spawn_upstream().await;

        client.cities("Москва").await.unwrap();
        client.cities("Казань").await.unwrap();

        assert_eq!(upstream.lookup_calls.load(Ordering::SeqCst), 2);
        assert_eq!(upstream.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_drops_cached_token() {
        let (upstream, client) = spawn_upstream().await;
        upstream.reject_next_lookup.store(true, Ordering::SeqCst);

        let rejected = client.cities("Москва").await;
        assert!(matches!(
            rejected,
            Err(CdekError::Api { status, .. }) if status == reqwest::StatusCode::UNAUTHORIZED
        ));

        let cities = client.cities("Москва").await.unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(upstream.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_failure_means_no_access_token() {
        let (upstream, client) = spawn_upstream().await;
        upstream.reject_token.store(true, Ordering::SeqCst);

        let result = client.cities("Москва").await;
        assert!(matches!(result, Err(CdekError::NoAccessToken)));
        assert_eq!(upstream.lookup_calls.load(Ordering::SeqCst), 0);

        // A failed token request is not cached.
        upstream.reject_token.store(false, Ordering::SeqCst);
        assert!(client.cities("Москва").await.is_ok());
    }
}
