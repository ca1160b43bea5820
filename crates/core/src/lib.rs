//! Poizon Core - Shared domain types.
//!
//! This crate provides the domain vocabulary used by every component of the
//! order backend:
//! - `server` - HTTP API for the Telegram Mini-App and the bot webhook
//! - `cli` - Command-line tools for migrations and webhook management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Pricing, the order status state machine and the
//! loyalty rules live here so they can be tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, order status, shipping options, public order IDs
//! - [`pricing`] - Final price formula and exchange-rate markup
//! - [`loyalty`] - Loyalty tiers and achievements

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod loyalty;
pub mod pricing;
pub mod types;

pub use loyalty::{Achievements, LoyaltyTier, TierProgress};
pub use pricing::{
    PricingConfig, PricingError, calculate_final_price, markup_rate, validate_raw_price,
};
pub use types::*;
