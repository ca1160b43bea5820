//! Telegram Mini-App initData verification.
//!
//! Telegram signs the launch payload with a key derived from the bot token:
//!
//! ```text
//! secret_key = HMAC_SHA256(key = "WebAppData", msg = bot_token)
//! hash       = hex(HMAC_SHA256(key = secret_key, msg = data_check_string))
//! ```
//!
//! `data_check_string` is every field except `hash`, sorted by key, formatted
//! as `key=value` and joined with `\n`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// The `user` object embedded in initData.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// initData whose signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInitData {
    pub user: TelegramUser,
    pub auth_date: Option<DateTime<Utc>>,
    /// `startapp` parameter the Mini-App was opened with (e.g. `ref_42`).
    pub start_param: Option<String>,
}

/// Verifies initData signatures for one bot.
#[derive(Clone)]
pub struct InitDataVerifier {
    secret_key: Vec<u8>,
    max_age: Option<Duration>,
}

impl std::fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitDataVerifier")
            .field("secret_key", &"[REDACTED]")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl InitDataVerifier {
    /// Derive the verification key from the bot token.
    #[must_use]
    pub fn new(bot_token: &SecretString, max_age: Option<Duration>) -> Self {
        Self {
            secret_key: derive_secret_key(bot_token.expose_secret()),
            max_age,
        }
    }

    /// Verify initData against the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_at`].
    pub fn verify(&self, init_data: &str) -> Result<VerifiedInitData, AuthError> {
        self.verify_at(init_data, Utc::now())
    }

    /// Verify initData as of `now`.
    ///
    /// # Errors
    ///
    /// - `AuthError::MalformedInitData` if `hash` or `user` is missing, a key
    ///   repeats, or the user JSON is invalid
    /// - `AuthError::InvalidSignature` if the hash does not match
    /// - `AuthError::InitDataExpired` if `auth_date` is too old
    pub fn verify_at(
        &self,
        init_data: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedInitData, AuthError> {
        let mut fields = parse_fields(init_data)?;
        let hash = fields
            .remove("hash")
            .ok_or_else(|| AuthError::MalformedInitData("missing hash".to_string()))?;
        let supplied = hex::decode(hash.trim()).map_err(|_| AuthError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret_key)
            .map_err(|_| AuthError::InvalidSignature)?;
        mac.update(data_check_string(&fields).as_bytes());
        // Constant-time comparison
        mac.verify_slice(&supplied)
            .map_err(|_| AuthError::InvalidSignature)?;

        let auth_date = match fields.get("auth_date") {
            Some(raw) => Some(parse_auth_date(raw)?),
            None => None,
        };
        if let Some(max_age) = self.max_age {
            let signed_at = auth_date
                .ok_or_else(|| AuthError::MalformedInitData("missing auth_date".to_string()))?;
            let age = now.signed_duration_since(signed_at);
            if age.to_std().is_ok_and(|age| age > max_age) {
                return Err(AuthError::InitDataExpired);
            }
        }

        let user_json = fields
            .get("user")
            .ok_or_else(|| AuthError::MalformedInitData("missing user".to_string()))?;
        let user: TelegramUser = serde_json::from_str(user_json)
            .map_err(|e| AuthError::MalformedInitData(format!("invalid user: {e}")))?;

        Ok(VerifiedInitData {
            user,
            auth_date,
            start_param: fields.get("start_param").cloned(),
        })
    }
}

fn derive_secret_key(bot_token: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(WEB_APP_DATA_KEY)
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(bot_token.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn parse_fields(init_data: &str) -> Result<BTreeMap<String, String>, AuthError> {
    let mut fields = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(init_data.trim().as_bytes()) {
        if fields
            .insert(key.clone().into_owned(), value.into_owned())
            .is_some()
        {
            return Err(AuthError::MalformedInitData(format!("duplicate field {key}")));
        }
    }
    if fields.is_empty() {
        return Err(AuthError::MalformedInitData("empty payload".to_string()));
    }
    Ok(fields)
}

/// `key=value` lines sorted by key. `BTreeMap` iterates in key order.
fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_auth_date(raw: &str) -> Result<DateTime<Utc>, AuthError> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| AuthError::MalformedInitData("invalid auth_date".to_string()))
}

/// Build a correctly signed initData string, as Telegram would.
#[cfg(any(test, feature = "test-support"))]
#[must_use]
pub fn sign_init_data(bot_token: &str, fields: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    let mut mac = HmacSha256::new_from_slice(&derive_secret_key(bot_token))
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(data_check_string(&sorted).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BOT_TOKEN: &str = "123456:AAH-test-token";
    const USER: &str = r#"{"id":777000,"first_name":"Аня","username":"anya"}"#;

    fn verifier(max_age: Option<Duration>) -> InitDataVerifier {
        InitDataVerifier::new(&SecretString::from(BOT_TOKEN), max_age)
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_100, 0).unwrap()
    }

    fn signed() -> String {
        sign_init_data(
            BOT_TOKEN,
            &[
                ("query_id", "AAF3"),
                ("user", USER),
                ("auth_date", "1700000000"),
            ],
        )
    }

    #[test]
    fn test_valid_init_data() {
        let verified = verifier(None).verify_at(&signed(), now()).unwrap();
        assert_eq!(verified.user.id, 777_000);
        assert_eq!(verified.user.username.as_deref(), Some("anya"));
        assert_eq!(verified.auth_date.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let reordered = sign_init_data(
            BOT_TOKEN,
            &[
                ("auth_date", "1700000000"),
                ("user", USER),
                ("query_id", "AAF3"),
            ],
        );
        assert!(verifier(None).verify_at(&reordered, now()).is_ok());
    }

    #[test]
    fn test_single_character_change_is_rejected() {
        let tampered = signed().replace("AAF3", "AAF4");
        assert!(matches!(
            verifier(None).verify_at(&tampered, now()),
            Err(AuthError::InvalidSignature)
        ));

        let tampered = signed().replace("1700000000", "1700000001");
        assert!(matches!(
            verifier(None).verify_at(&tampered, now()),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_other_bot_token_is_rejected() {
        let foreign = sign_init_data(
            "999:other",
            &[("user", USER), ("auth_date", "1700000000")],
        );
        assert!(matches!(
            verifier(None).verify_at(&foreign, now()),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_missing_hash_is_malformed() {
        assert!(matches!(
            verifier(None).verify_at("user=%7B%7D&auth_date=1", now()),
            Err(AuthError::MalformedInitData(_))
        ));
        assert!(matches!(
            verifier(None).verify_at("", now()),
            Err(AuthError::MalformedInitData(_))
        ));
    }

    #[test]
    fn test_missing_user_is_malformed() {
        let no_user = sign_init_data(BOT_TOKEN, &[("auth_date", "1700000000")]);
        assert!(matches!(
            verifier(None).verify_at(&no_user, now()),
            Err(AuthError::MalformedInitData(_))
        ));
    }

    #[test]
    fn test_max_age() {
        let day = Some(Duration::from_secs(86_400));
        assert!(verifier(day).verify_at(&signed(), now()).is_ok());

        let much_later = DateTime::from_timestamp(1_700_000_000 + 86_401, 0).unwrap();
        assert!(matches!(
            verifier(day).verify_at(&signed(), much_later),
            Err(AuthError::InitDataExpired)
        ));
    }

    #[test]
    fn test_start_param_is_exposed() {
        let data = sign_init_data(
            BOT_TOKEN,
            &[
                ("user", USER),
                ("auth_date", "1700000000"),
                ("start_param", "ref_42"),
            ],
        );
        let verified = verifier(None).verify_at(&data, now()).unwrap();
        assert_eq!(verified.start_param.as_deref(), Some("ref_42"));
    }
}
