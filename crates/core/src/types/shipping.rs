//! Shipping and delivery options.

use serde::{Deserialize, Serialize};

/// How a parcel travels from the warehouse in China.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    Air,
    #[default]
    Standard,
}

impl ShippingMethod {
    /// Interpret client input. `"air"` selects air freight; any other value
    /// falls back to standard shipping.
    #[must_use]
    pub fn from_input(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("air") {
            Self::Air
        } else {
            Self::Standard
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Air => "air",
            Self::Standard => "standard",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Air => "Авиа",
            Self::Standard => "Стандарт",
        }
    }
}

impl std::fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer receives the parcel in Russia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// CDEK pickup point.
    Pickup,
    /// Courier delivery to a street address.
    Address,
}

impl DeliveryType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Address => "address",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pickup => "Пункт выдачи СДЭК",
            Self::Address => "Курьер до адреса",
        }
    }
}

impl std::fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(Self::Pickup),
            "address" => Ok(Self::Address),
            _ => Err(format!("invalid delivery type: {s}")),
        }
    }
}
