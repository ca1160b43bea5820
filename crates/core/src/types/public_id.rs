//! Short human-readable order identifiers.
//!
//! A public ID is 7 characters drawn from `A-Z0-9` (36^7 ≈ 7.8·10¹⁰ values).
//! IDs are random, so collisions are possible and must be handled by the
//! store (unique constraint + regeneration), never assumed away.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Symbols a public ID is drawn from.
pub const PUBLIC_ID_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of characters in a public ID.
pub const PUBLIC_ID_LENGTH: usize = 7;

/// Error parsing a public ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublicIdError {
    #[error("public id must be {PUBLIC_ID_LENGTH} characters, got {0}")]
    InvalidLength(usize),
    #[error("public id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Customer-facing order code, distinct from the internal database ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(String);

impl PublicId {
    /// Draw a new random public ID.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..PUBLIC_ID_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..PUBLIC_ID_ALPHABET.len());
                PUBLIC_ID_ALPHABET.get(idx).copied().map_or('A', char::from)
            })
            .collect();
        Self(code)
    }

    /// Parse and validate a stored or user-supplied public ID.
    ///
    /// # Errors
    ///
    /// Returns `PublicIdError` if the value has the wrong length or contains
    /// characters outside the alphabet.
    pub fn parse(value: &str) -> Result<Self, PublicIdError> {
        let len = value.chars().count();
        if len != PUBLIC_ID_LENGTH {
            return Err(PublicIdError::InvalidLength(len));
        }
        if let Some(bad) = value
            .chars()
            .find(|c| !c.is_ascii_uppercase() && !c.is_ascii_digit())
        {
            return Err(PublicIdError::InvalidCharacter(bad));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
