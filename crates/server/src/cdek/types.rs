//! CDEK API response types.

use serde::{Deserialize, Serialize};

/// A city from `/location/cities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// CDEK city code, used for pickup point lookups.
    pub code: i64,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// A pickup point from `/deliverypoints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPoint {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    pub location: PointLocation,
    #[serde(default)]
    pub work_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLocation {
    #[serde(default)]
    pub city: Option<String>,
    /// Short address, e.g. `ул. Тверская, 7`.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub address_full: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// OAuth token response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body returned by CDEK.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEntry {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub(crate) fn summary(&self) -> Option<String> {
        let parts: Vec<String> = self
            .errors
            .iter()
            .filter_map(|e| match (&e.code, &e.message) {
                (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                (None, Some(message)) => Some(message.clone()),
                (Some(code), None) => Some(code.clone()),
                (None, None) => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

/// Street names found in pickup point addresses, filtered by `query`.
///
/// The street is the part of the short address before the first comma.
/// Matching is case-insensitive; results are de-duplicated and sorted.
#[must_use]
pub fn streets_from_points(points: &[DeliveryPoint], query: &str, limit: usize) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    let mut streets: Vec<String> = points
        .iter()
        .filter_map(|point| point.location.address.as_deref())
        .filter_map(|address| address.split(',').next())
        .map(str::trim)
        .filter(|street| !street.is_empty())
        .filter(|street| needle.is_empty() || street.to_lowercase().contains(&needle))
        .map(str::to_string)
        .collect();
    streets.sort();
    streets.dedup();
    streets.truncate(limit);
    streets
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn point(code: &str, address: &str) -> DeliveryPoint {
        DeliveryPoint {
            code: code.to_string(),
            name: None,
            location: PointLocation {
                city: Some("Москва".to_string()),
                address: Some(address.to_string()),
                address_full: None,
                latitude: None,
                longitude: None,
            },
            work_time: None,
        }
    }

    #[test]
    fn test_streets_from_points() {
        let points = vec![
            point("MSK1", "ул. Тверская, 7"),
            point("MSK2", "ул. Тверская, 12"),
            point("MSK3", "пр-т Мира, 1"),
            point("MSK4", "Тверской бульвар, 3"),
        ];

        assert_eq!(
            streets_from_points(&points, "ТВЕР", 10),
            vec!["Тверской бульвар".to_string(), "ул. Тверская".to_string()]
        );
        assert_eq!(streets_from_points(&points, "", 10).len(), 3);
        assert_eq!(streets_from_points(&points, "", 1).len(), 1);
    }

    #[test]
    fn test_deserialize_delivery_point() {
        let json = r#"[{
            "code": "MSK123",
            "name": "На Тверской",
            "location": {
                "country_code": "RU",
                "city_code": 44,
                "city": "Москва",
                "address": "ул. Тверская, 7",
                "address_full": "Россия, Москва, ул. Тверская, 7",
                "latitude": 55.75,
                "longitude": 37.61
            },
            "work_time": "Пн-Вс 10:00-21:00",
            "type": "PVZ"
        }]"#;
        let points: Vec<DeliveryPoint> = serde_json::from_str(json).unwrap();
        assert_eq!(points.first().unwrap().code, "MSK123");
    }

    #[test]
    fn test_error_summary() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"errors":[{"code":"v2_bad_request","message":"Bad"}]}"#)
                .unwrap();
        assert_eq!(body.summary().as_deref(), Some("v2_bad_request: Bad"));
        assert_eq!(ErrorResponse::default().summary(), None);
    }
}
