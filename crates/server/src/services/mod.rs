//! Business logic services.
//!
//! # Services
//!
//! - `auth` - initData verification and session tokens
//! - `orders` - Checkout, quotes and the operator status flow
//! - `profile` - Loyalty and history aggregation
//! - `rates` - CNY→RUB exchange rate

pub mod auth;
pub mod orders;
pub mod profile;
pub mod rates;

pub use orders::{
    CallbackOutcome, CheckoutError, CheckoutRequest, CheckoutResponse, OrderService,
    OrderStatusView, Quote,
};
pub use profile::{Profile, ProfileService, build_profile};
pub use rates::{CbrRateSource, ExchangeRateProvider, RateError, RateQuote, RateSource};
