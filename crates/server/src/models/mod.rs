//! Domain models for the order backend.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod address;
pub mod cart;
pub mod order;
pub mod user;

pub use address::Address;
pub use cart::{CartItem, NewCartItem};
pub use order::{NewOrder, Order};
pub use user::{NewUser, User};
