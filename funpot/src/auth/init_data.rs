//! Launch payload ("initData") verification.
//!
//! The messaging client hands the web app a URL-encoded query string signed
//! by the platform. Verification rebuilds the canonical data-check string,
//! derives the signing key from the bot token and compares HMACs in constant
//! time.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use super::errors::{AuthError, AuthResult};
use crate::users::{ExternalProfile, ExternalUserId};

type HmacSha256 = Hmac<Sha256>;

/// Fixed key used to derive the payload signing key from the bot token
const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

const HASH_FIELD: &str = "hash";
const AUTH_DATE_FIELD: &str = "auth_date";
const USER_FIELD: &str = "user";

/// Decoded payload fields, sorted by key byte-wise
type Fields = BTreeMap<String, Vec<String>>;

/// User object embedded in the launch payload
#[derive(Debug, Clone, Deserialize)]
struct PlatformUser {
    id: ExternalUserId,
    #[serde(default)]
    is_bot: Option<bool>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

/// Identity extracted from a launch payload whose signature and freshness
/// have been checked.
///
/// Only [`verify_init_data`] can produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    external_user_id: ExternalUserId,
    username: String,
    first_name: String,
    last_name: String,
    language_code: String,
    is_bot: bool,
    photo_url: Option<String>,
    auth_date: DateTime<Utc>,
    fields: Fields,
}

impl VerifiedIdentity {
    pub fn external_user_id(&self) -> ExternalUserId {
        self.external_user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn language_code(&self) -> &str {
        &self.language_code
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    /// When the platform signed the payload
    pub fn auth_date(&self) -> DateTime<Utc> {
        self.auth_date
    }

    /// First value of any other signed payload field, e.g. `query_id`
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

impl From<&VerifiedIdentity> for ExternalProfile {
    fn from(identity: &VerifiedIdentity) -> Self {
        ExternalProfile {
            id: identity.external_user_id,
            username: identity.username.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            language_code: identity.language_code.clone(),
        }
    }
}

/// Verify a raw launch payload.
///
/// # Arguments
///
/// * `raw` - URL-encoded query string as received from the client
/// * `secret` - bot token shared with the platform
/// * `max_age` - accepted age of `auth_date`; zero or negative disables the check
/// * `now` - current time
///
/// # Errors
///
/// * `AuthError::MissingSecret` - `secret` is empty
/// * `AuthError::MalformedPayload` - `raw` is not a valid query string
/// * `AuthError::MissingHash` / `MissingAuthDate` / `MalformedAuthDate`
/// * `AuthError::Expired` - `now - auth_date > max_age`
/// * `AuthError::SignatureMismatch` - hash is not hex or does not match
/// * `AuthError::MissingUser` / `MalformedUser`
pub fn verify_init_data(
    raw: &str,
    secret: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> AuthResult<VerifiedIdentity> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let mut fields = parse_query(raw)?;

    let hash = first_non_empty(&fields, HASH_FIELD)
        .ok_or(AuthError::MissingHash)?
        .to_string();

    let auth_date = first_non_empty(&fields, AUTH_DATE_FIELD).ok_or(AuthError::MissingAuthDate)?;
    let auth_date = parse_auth_date(auth_date)?;

    // Exactly max_age old is still fresh
    if max_age > Duration::zero() && now - auth_date > max_age {
        return Err(AuthError::Expired);
    }

    fields.remove(HASH_FIELD);
    let expected = signature(&data_check_string(&fields), secret)?;
    let provided = hex::decode(&hash).map_err(|_| AuthError::SignatureMismatch)?;
    if !bool::from(provided.as_slice().ct_eq(expected.as_slice())) {
        return Err(AuthError::SignatureMismatch);
    }

    let user = first_non_empty(&fields, USER_FIELD).ok_or(AuthError::MissingUser)?;
    let user: PlatformUser =
        serde_json::from_str(user).map_err(|e| AuthError::MalformedUser(e.to_string()))?;

    Ok(VerifiedIdentity {
        external_user_id: user.id,
        username: user.username.unwrap_or_default(),
        first_name: user.first_name.unwrap_or_default(),
        last_name: user.last_name.unwrap_or_default(),
        language_code: user.language_code.unwrap_or_default(),
        is_bot: user.is_bot.unwrap_or(false),
        photo_url: user.photo_url,
        auth_date,
        fields,
    })
}

/// Compute the hex `hash` the platform would attach to `fields`.
///
/// Any `hash` entry in `fields` is ignored. Repeated keys keep their order.
pub fn sign_init_data<K, V>(fields: &[(K, V)], secret: &str) -> AuthResult<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let mut collected = Fields::new();
    for (key, value) in fields {
        if key.as_ref() == HASH_FIELD {
            continue;
        }
        collected
            .entry(key.as_ref().to_string())
            .or_default()
            .push(value.as_ref().to_string());
    }

    Ok(hex::encode(signature(&data_check_string(&collected), secret)?))
}

/// Build a signed, URL-encoded launch payload from `fields`.
pub fn encode_signed_init_data<K, V>(fields: &[(K, V)], secret: &str) -> AuthResult<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let hash = sign_init_data(fields, secret)?;
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        if key.as_ref() != HASH_FIELD {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
    }
    serializer.append_pair(HASH_FIELD, &hash);
    Ok(serializer.finish())
}

/// `key=value` lines in byte-wise key order; repeated values joined by `\n`
fn data_check_string(fields: &Fields) -> String {
    fields
        .iter()
        .map(|(key, values)| format!("{key}={}", values.join("\n")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn signature(data_check_string: &str, secret: &str) -> AuthResult<Vec<u8>> {
    let secret_key = hmac_sha256(WEB_APP_DATA_KEY, secret.as_bytes())?;
    hmac_sha256(&secret_key, data_check_string.as_bytes())
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> AuthResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AuthError::InvalidConfiguration(format!("HMAC key rejected: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn first_non_empty<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(|values| values.first())
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn parse_auth_date(value: &str) -> AuthResult<DateTime<Utc>> {
    let seconds: i64 = value.parse().map_err(|_| AuthError::MalformedAuthDate)?;
    DateTime::from_timestamp(seconds, 0).ok_or(AuthError::MalformedAuthDate)
}

/// Decode a query string, rejecting what a strict parser would.
fn parse_query(raw: &str) -> AuthResult<Fields> {
    if raw.contains(';') {
        return Err(AuthError::MalformedPayload(
            "semicolon separators are not allowed".to_string(),
        ));
    }
    check_percent_escapes(raw)?;

    let mut fields = Fields::new();
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        fields
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    Ok(fields)
}

fn check_percent_escapes(raw: &str) -> AuthResult<()> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(AuthError::MalformedPayload(format!(
                    "invalid percent escape at byte {i}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
