//! Core types for the order backend.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod public_id;
pub mod shipping;
pub mod status;

pub use id::*;
pub use public_id::{PUBLIC_ID_ALPHABET, PUBLIC_ID_LENGTH, PublicId, PublicIdError};
pub use shipping::{DeliveryType, ShippingMethod};
pub use status::{OrderStatus, StatusAction, StatusActionError, TransitionError};
