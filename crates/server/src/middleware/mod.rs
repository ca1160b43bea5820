//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (restricted to the Mini-App origin when configured)
//! 5. Rate limiting (governor), per route group
//!
//! Authentication is an extractor ([`RequireAuth`]) rather than a layer so
//! public routes stay unaffected.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::RequireAuth;
pub use rate_limit::{
    ClientIp, ClientIpKeyExtractor, RateLimitConfigError, RateLimiterLayer, api_rate_limiter,
    auth_rate_limiter, client_ip,
};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
