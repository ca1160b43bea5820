//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Provides rate limiters for the two endpoint groups:
//! - `auth_rate_limiter`: Strict limits for `/api/auth/*` (~10/min)
//! - `api_rate_limiter`: Configurable per-minute limit for the rest of `/api`

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{Extensions, HeaderMap, Request, request::Parts};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use thiserror::Error;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP
// =============================================================================

/// The client IP as reported by the fronting proxy.
///
/// Checks `CF-Connecting-IP`, then the first `X-Forwarded-For` entry, then
/// `X-Real-IP`.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("cf-connecting-ip")
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| header("x-real-ip").and_then(|s| s.trim().parse::<IpAddr>().ok()))
}

/// [`client_ip`], falling back to the TCP peer recorded by
/// `into_make_service_with_connect_info`.
fn request_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    client_ip(headers).or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Extractor for the caller's IP, for logging.
///
/// `None` only when there are no proxy headers and no peer address (e.g. a
/// router driven directly in tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(request_ip(&parts.headers, &parts.extensions)))
    }
}

/// Key extractor that uses [`client_ip`], falling back to the peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        request_ip(req.headers(), req.extensions()).ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Rate limiter parameters were rejected by governor.
#[derive(Debug, Error)]
#[error("invalid rate limit: {0}")]
pub struct RateLimitConfigError(String);

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Errors
///
/// Returns `RateLimitConfigError` if governor rejects the configuration.
pub fn auth_rate_limiter() -> Result<RateLimiterLayer, RateLimitConfigError> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .ok_or_else(|| RateLimitConfigError("auth limiter".to_string()))?;
    Ok(GovernorLayer::new(Arc::new(config)))
}

/// Create rate limiter for the general API: `per_minute` requests per
/// minute per IP, all of which may be used in a burst.
///
/// # Errors
///
/// Returns `RateLimitConfigError` if `per_minute` is zero.
pub fn api_rate_limiter(per_minute: u32) -> Result<RateLimiterLayer, RateLimitConfigError> {
    if per_minute == 0 {
        return Err(RateLimitConfigError(
            "requests per minute must be positive".to_string(),
        ));
    }
    let period_ms = (60_000 / u64::from(per_minute)).max(1);
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_millisecond(period_ms)
        .burst_size(per_minute)
        .finish()
        .ok_or_else(|| RateLimitConfigError(format!("{per_minute} per minute")))?;
    Ok(GovernorLayer::new(Arc::new(config)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_client_ip_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.3"));
        assert_eq!(client_ip(&headers), "10.0.0.3".parse().ok());

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7".parse().ok());

        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers), "198.51.100.2".parse().ok());
    }

    #[test]
    fn test_client_ip_ignores_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        assert_eq!(client_ip(&headers), None);
    }

    fn request_parts(forwarded_for: Option<&'static str>, peer: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/verify");
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        if let Some(peer) = peer {
            parts
                .extensions
                .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        }
        parts
    }

    #[tokio::test]
    async fn test_client_ip_extractor_falls_back_to_peer() {
        let mut direct = request_parts(None, Some("192.0.2.10:50123"));
        let ClientIp(ip) = ClientIp::from_request_parts(&mut direct, &()).await.unwrap();
        assert_eq!(ip, "192.0.2.10".parse().ok());

        let mut proxied = request_parts(Some("203.0.113.7"), Some("10.0.0.1:443"));
        let ClientIp(ip) = ClientIp::from_request_parts(&mut proxied, &()).await.unwrap();
        assert_eq!(ip, "203.0.113.7".parse().ok());

        let mut bare = request_parts(None, None);
        let ClientIp(ip) = ClientIp::from_request_parts(&mut bare, &()).await.unwrap();
        assert_eq!(ip, None);
    }

    #[test]
    fn test_limiter_construction() {
        assert!(auth_rate_limiter().is_ok());
        assert!(api_rate_limiter(100).is_ok());
        assert!(api_rate_limiter(0).is_err());
    }
}
