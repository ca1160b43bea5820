//! CNY→RUB exchange rate with caching and a fixed fallback.
//!
//! The upstream quote is marked up by one ruble and rounded to kopecks (see
//! [`poizon_core::markup_rate`]). Successful lookups are cached in `moka`
//! for the configured TTL. Concurrent misses share one upstream request,
//! failed or not. When the source fails the fallback rate is returned and
//! nothing is cached, so the next call retries.

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use poizon_core::{PricingError, markup_rate};

use crate::config::RateConfig;

/// Errors fetching an upstream quote.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid quote: {0}")]
    InvalidQuote(#[from] PricingError),
}

/// An upstream quote: `value` rubles per `nominal` yuan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuote {
    pub value: Decimal,
    pub nominal: Decimal,
}

/// Where quotes come from.
pub trait RateSource: Send + Sync {
    fn fetch_quote(&self) -> impl Future<Output = Result<RateQuote, RateError>> + Send;
}

// =============================================================================
// CBR daily JSON
// =============================================================================

#[derive(Debug, Deserialize)]
struct DailyRates {
    #[serde(rename = "Valute")]
    valute: Valute,
}

#[derive(Debug, Deserialize)]
struct Valute {
    #[serde(rename = "CNY")]
    cny: CurrencyQuote,
}

#[derive(Debug, Deserialize)]
struct CurrencyQuote {
    #[serde(rename = "Value")]
    value: serde_json::Value,
    #[serde(rename = "Nominal")]
    nominal: serde_json::Value,
}

/// Rates published by the Central Bank of Russia (`cbr-xml-daily.ru`).
#[derive(Debug, Clone)]
pub struct CbrRateSource {
    client: reqwest::Client,
    url: String,
}

impl CbrRateSource {
    /// Create a source with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns `RateError::Request` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RateError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl RateSource for CbrRateSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_quote(&self) -> Result<RateQuote, RateError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Status(status));
        }

        // The endpoint serves JSON as `application/javascript`.
        let body = response.text().await?;
        parse_daily_rates(&body)
    }
}

/// Extract the CNY quote from a CBR daily JSON document.
///
/// # Errors
///
/// Returns `RateError::Malformed` if the document lacks a numeric CNY quote.
pub fn parse_daily_rates(body: &str) -> Result<RateQuote, RateError> {
    let daily: DailyRates =
        serde_json::from_str(body).map_err(|e| RateError::Malformed(e.to_string()))?;
    let quote = daily.valute.cny;
    Ok(RateQuote {
        value: json_decimal(&quote.value, "Value")?,
        nominal: json_decimal(&quote.nominal, "Nominal")?,
    })
}

fn json_decimal(value: &serde_json::Value, field: &str) -> Result<Decimal, RateError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        serde_json::Value::String(s) => s.replace(',', ".").trim().parse::<Decimal>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RateError::Malformed(format!("{field} is not a number")))
}

// =============================================================================
// Provider
// =============================================================================

/// Cached exchange rate with fallback.
///
/// There is one rate, so the cache holds a single entry under `()`.
pub struct ExchangeRateProvider<R> {
    source: R,
    cache: Cache<(), Decimal>,
    fallback: Decimal,
}

impl<R: std::fmt::Debug> std::fmt::Debug for ExchangeRateProvider<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRateProvider")
            .field("source", &self.source)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl<R: RateSource> ExchangeRateProvider<R> {
    #[must_use]
    pub fn new(source: R, ttl: Duration, fallback: Decimal) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            source,
            cache,
            fallback,
        }
    }

    #[must_use]
    pub fn from_config(source: R, config: &RateConfig) -> Self {
        Self::new(source, config.cache_ttl, config.fallback)
    }

    /// Current marked-up rate, or the fallback if the source is unavailable.
    pub async fn get_rate(&self) -> Decimal {
        let fetched = self
            .cache
            .try_get_with((), async {
                let quote = self.source.fetch_quote().await?;
                Ok::<_, RateError>(markup_rate(quote.value, quote.nominal)?)
            })
            .await;

        match fetched {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(error = %e, fallback = %self.fallback, "Exchange rate unavailable, using fallback");
                self.fallback
            }
        }
    }

    /// Drop the cached rate so the next call fetches.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}

/// A source returning fixed quotes, counting calls.
#[cfg(any(test, feature = "test-support"))]
pub mod fixed {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{RateError, RateQuote, RateSource};

    #[derive(Debug, Clone, Default)]
    pub struct FixedRateSource {
        quote: Option<RateQuote>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl FixedRateSource {
        /// Always answer with `quote`.
        #[must_use]
        pub fn new(quote: RateQuote) -> Self {
            Self {
                quote: Some(quote),
                ..Self::default()
            }
        }

        /// Always fail.
        #[must_use]
        pub fn failing() -> Self {
            Self::default()
        }

        /// Answer only after `delay`, like a slow upstream.
        #[must_use]
        pub const fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RateSource for FixedRateSource {
        async fn fetch_quote(&self) -> Result<RateQuote, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.quote
                .ok_or_else(|| RateError::Malformed("source unavailable".to_string()))
        }
    }
}
