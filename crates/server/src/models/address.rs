//! Saved delivery address.

use serde::{Deserialize, Serialize};

use poizon_core::DeliveryType;

/// A user's delivery address. One per user, replaced wholesale on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Recipient's full name.
    pub name: String,
    pub phone: String,
    pub city: String,
    /// CDEK city code, when the city was picked from carrier suggestions.
    #[serde(default, alias = "city_code")]
    pub city_code: Option<String>,
    /// Required for courier delivery.
    #[serde(default)]
    pub street: Option<String>,
    pub delivery_type: DeliveryType,
    /// CDEK pickup point code; required for pickup delivery.
    #[serde(default)]
    pub pickup_code: Option<String>,
    #[serde(default)]
    pub pickup_address: Option<String>,
}

impl Address {
    /// Check required fields for the chosen delivery type.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message for the first missing field, worded
    /// like the checkout form's.
    pub fn validate(&self) -> Result<(), String> {
        require(&self.name, "ФИО обязательно")?;
        require(&self.phone, "Телефон обязателен")?;
        require(&self.city, "Город обязателен")?;
        match self.delivery_type {
            DeliveryType::Pickup => require(
                self.pickup_code.as_deref().unwrap_or_default(),
                "Выберите пункт выдачи",
            ),
            DeliveryType::Address => {
                require(self.street.as_deref().unwrap_or_default(), "Укажите улицу")
            }
        }
    }

    /// Trim surrounding whitespace and drop empty optional fields.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            city: self.city.trim().to_string(),
            city_code: non_empty(self.city_code),
            street: non_empty(self.street),
            delivery_type: self.delivery_type,
            pickup_code: non_empty(self.pickup_code),
            pickup_address: non_empty(self.pickup_address),
        }
    }
}

fn require(value: &str, message: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(message.to_string())
    } else {
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
