//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `POIZON_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `TELEGRAM_BOT_TOKEN` - Bot API token, also the initData signing key
//! - `TELEGRAM_ADMIN_CHAT_ID` - Operator chat that receives order notifications
//! - `JWT_SECRET` - Session token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `POIZON_HOST` - Bind address (default: 127.0.0.1)
//! - `POIZON_PORT` - Listen port (default: 3000)
//! - `APP_ENV` - `development` or `production` (default: development)
//! - `WEB_APP_URL` - Mini-App URL used for the `/start` launch button
//! - `TELEGRAM_BOT_USERNAME` - Bot username for referral links
//! - `TELEGRAM_WEBHOOK_SECRET` - Expected `X-Telegram-Bot-Api-Secret-Token`
//! - `ALLOWED_ORIGIN` - CORS origin of the Mini-App
//! - `RATE_LIMIT_PER_MINUTE` - General API rate limit per client (default: 100)
//! - `PRICING_FIXED_FEE` / `PRICING_AIR_FEE` / `PRICING_STANDARD_FEE` - Fees in rubles
//! - `RATE_SOURCE_URL` - Exchange rate JSON (default: CBR daily)
//! - `RATE_CACHE_TTL_SECS` - Exchange rate cache lifetime (default: 3600)
//! - `RATE_FALLBACK` - Rate used when the source is unavailable (default: 14)
//! - `CDEK_CLIENT_ID` / `CDEK_CLIENT_SECRET` - Carrier credentials (both or neither)
//! - `CDEK_API_URL` - Carrier API base (default: <https://api.cdek.ru/v2>)
//! - `UPSTREAM_TIMEOUT_SECS` - Timeout for outbound HTTP calls (default: 10)
//! - `INIT_DATA_MAX_AGE_SECS` - Max initData age, 0 disables (default: 86400)
//! - `DEV_AUTH_USER_ID` / `DEV_AUTH_USERNAME` - Developer identity (refused in production)
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use poizon_core::PricingConfig;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default exchange rate source (Central Bank of Russia daily rates).
pub const DEFAULT_RATE_SOURCE_URL: &str = "https://www.cbr-xml-daily.ru/daily_json.js";
/// Default CDEK API base URL.
pub const DEFAULT_CDEK_API_URL: &str = "https://api.cdek.ru/v2";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    pub app_env: AppEnv,
    /// Session token signing secret
    pub jwt_secret: SecretString,
    pub telegram: TelegramConfig,
    /// Mini-App URL for the bot's launch button
    pub web_app_url: Option<String>,
    /// CORS origin; any origin when unset
    pub allowed_origin: Option<String>,
    pub rate_limit_per_minute: u32,
    pub pricing: PricingConfig,
    pub rates: RateConfig,
    /// Carrier credentials; lookups answer 503 when absent
    pub cdek: Option<CdekConfig>,
    /// Timeout applied to every outbound HTTP call
    pub upstream_timeout: Duration,
    /// Maximum initData age; `None` disables the check
    pub init_data_max_age: Option<Duration>,
    /// Explicit developer identity injected when no bearer token is sent
    pub dev_identity: Option<DevIdentity>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Telegram Bot API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub bot_username: Option<String>,
    /// Chat that receives new-order notifications
    pub admin_chat_id: i64,
    /// Expected webhook secret header value
    pub webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("bot_username", &self.bot_username)
            .field("admin_chat_id", &self.admin_chat_id)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Exchange rate provider configuration.
#[derive(Debug, Clone)]
pub struct RateConfig {
    pub source_url: String,
    pub cache_ttl: Duration,
    /// Returned (uncached) when the source fails
    pub fallback: Decimal,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_RATE_SOURCE_URL.to_string(),
            cache_ttl: Duration::from_secs(3600),
            fallback: Decimal::from(14),
        }
    }
}

/// CDEK API credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct CdekConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for CdekConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdekConfig")
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Identity injected for unauthenticated requests in development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevIdentity {
    pub user_id: i64,
    pub username: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("POIZON_DATABASE_URL")?;
        let host = parse_env("POIZON_HOST", "127.0.0.1")?;
        let port = parse_env("POIZON_PORT", "3000")?;
        let app_env = parse_env("APP_ENV", "development")?;
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "JWT_SECRET")?;

        let telegram = TelegramConfig::from_env()?;
        let pricing = PricingConfig {
            fixed_fee: parse_env("PRICING_FIXED_FEE", "590")?,
            air_fee: parse_env("PRICING_AIR_FEE", "800")?,
            standard_fee: parse_env("PRICING_STANDARD_FEE", "400")?,
        };
        let rates = RateConfig {
            source_url: get_env_or_default("RATE_SOURCE_URL", DEFAULT_RATE_SOURCE_URL),
            cache_ttl: Duration::from_secs(parse_env("RATE_CACHE_TTL_SECS", "3600")?),
            fallback: parse_env("RATE_FALLBACK", "14")?,
        };

        let max_age_secs: u64 = parse_env("INIT_DATA_MAX_AGE_SECS", "86400")?;
        let dev_identity = dev_identity_from_env()?;
        check_dev_identity(app_env, dev_identity.as_ref())?;

        Ok(Self {
            database_url,
            host,
            port,
            app_env,
            jwt_secret,
            telegram,
            web_app_url: get_optional_env("WEB_APP_URL"),
            allowed_origin: get_optional_env("ALLOWED_ORIGIN"),
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", "100")?,
            pricing,
            rates,
            cdek: CdekConfig::from_env()?,
            upstream_timeout: Duration::from_secs(parse_env("UPSTREAM_TIMEOUT_SECS", "10")?),
            init_data_max_age: (max_age_secs > 0).then(|| Duration::from_secs(max_age_secs)),
            dev_identity,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TelegramConfig {
    /// Load the Telegram settings on their own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the bot token or admin chat id is missing or
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let bot_token = get_required_secret("TELEGRAM_BOT_TOKEN")?;
        validate_bot_token(&bot_token)?;
        let admin_chat_id = get_required_env("TELEGRAM_ADMIN_CHAT_ID")?
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TELEGRAM_ADMIN_CHAT_ID".to_string(), e.to_string())
            })?;

        Ok(Self {
            bot_token,
            bot_username: get_optional_env("TELEGRAM_BOT_USERNAME")
                .map(|name| name.trim_start_matches('@').to_string()),
            admin_chat_id,
            webhook_secret: get_optional_env("TELEGRAM_WEBHOOK_SECRET").map(SecretString::from),
        })
    }
}

impl CdekConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("CDEK_CLIENT_ID"),
            get_optional_env("CDEK_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Ok(Some(Self {
                api_url: get_env_or_default("CDEK_API_URL", DEFAULT_CDEK_API_URL),
                client_id,
                client_secret: SecretString::from(client_secret),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar("CDEK_CLIENT_SECRET".to_string())),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar("CDEK_CLIENT_ID".to_string())),
        }
    }
}

fn dev_identity_from_env() -> Result<Option<DevIdentity>, ConfigError> {
    let Some(raw) = get_optional_env("DEV_AUTH_USER_ID") else {
        return Ok(None);
    };
    let user_id = raw
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidEnvVar("DEV_AUTH_USER_ID".to_string(), e.to_string()))?;
    Ok(Some(DevIdentity {
        user_id,
        username: get_optional_env("DEV_AUTH_USERNAME"),
    }))
}

/// Refuse the developer identity outside development.
fn check_dev_identity(app_env: AppEnv, dev: Option<&DevIdentity>) -> Result<(), ConfigError> {
    if app_env == AppEnv::Production && dev.is_some() {
        return Err(ConfigError::InvalidEnvVar(
            "DEV_AUTH_USER_ID".to_string(),
            "developer identity is not allowed when APP_ENV=production".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Bot tokens look like `<digits>:<secret>`.
fn validate_bot_token(token: &SecretString) -> Result<(), ConfigError> {
    let valid = token
        .expose_secret()
        .split_once(':')
        .is_some_and(|(id, secret)| {
            !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !secret.is_empty()
        });
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            "TELEGRAM_BOT_TOKEN".to_string(),
            "expected <bot id>:<token>".to_string(),
        ))
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/poizon"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            app_env: AppEnv::Development,
            jwt_secret: SecretString::from("x".repeat(32)),
            telegram: TelegramConfig {
                bot_token: SecretString::from("123456:AAH-super-private"),
                bot_username: Some("poizon_bot".to_string()),
                admin_chat_id: -100_123,
                webhook_secret: Some(SecretString::from("hook-private")),
            },
            web_app_url: None,
            allowed_origin: None,
            rate_limit_per_minute: 100,
            pricing: PricingConfig::default(),
            rates: RateConfig::default(),
            cdek: None,
            upstream_timeout: Duration::from_secs(10),
            init_data_max_age: Some(Duration::from_secs(86_400)),
            dev_identity: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-key-here", "JWT_SECRET");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "JWT_SECRET");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_jwt_secret_length() {
        assert!(validate_jwt_secret(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_jwt_secret(&SecretString::from("a".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_validate_bot_token() {
        assert!(validate_bot_token(&SecretString::from("123456:AAHabc")).is_ok());
        assert!(validate_bot_token(&SecretString::from("AAHabc")).is_err());
        assert!(validate_bot_token(&SecretString::from("12a:AAHabc")).is_err());
        assert!(validate_bot_token(&SecretString::from("123456:")).is_err());
    }

    #[test]
    fn test_app_env_parse() {
        assert_eq!("production".parse::<AppEnv>(), Ok(AppEnv::Production));
        assert_eq!("PROD".parse::<AppEnv>(), Ok(AppEnv::Production));
        assert_eq!("development".parse::<AppEnv>(), Ok(AppEnv::Development));
        assert!("staging".parse::<AppEnv>().is_err());
    }

    #[test]
    fn test_dev_identity_refused_in_production() {
        let dev = DevIdentity {
            user_id: 42,
            username: None,
        };
        assert!(check_dev_identity(AppEnv::Production, Some(&dev)).is_err());
        assert!(check_dev_identity(AppEnv::Development, Some(&dev)).is_ok());
        assert!(check_dev_identity(AppEnv::Production, None).is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_telegram_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config().telegram);

        assert!(debug_output.contains("poizon_bot"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-private"));
        assert!(!debug_output.contains("hook-private"));
    }

    #[test]
    fn test_cdek_config_debug_redacts_secret() {
        let config = CdekConfig {
            api_url: DEFAULT_CDEK_API_URL.to_string(),
            client_id: "client-id-value".to_string(),
            client_secret: SecretString::from("cdek-private-value"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("client-id-value"));
        assert!(!debug_output.contains("cdek-private-value"));
    }
}
