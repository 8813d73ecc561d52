//! Request and response shapes.
//!
//! Field names are camelCase on the wire. `payload` is an opaque JSON value
//! that is stored and returned verbatim.

use crate::error::{ErrorKind, TxnError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;

/// Token reported in error responses when the caller supplied none.
pub const UNKNOWN_TOKEN: &str = "unknown";

/// Requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnAction {
    Start,
    Resume,
    Close,
}

impl TxnAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Resume => "resume",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for TxnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxnRequest {
    pub action: TxnAction,

    /// Required for resume/close, forbidden for start. Empty means absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Opaque state. JSON `null` is treated as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Integers past `i64::MAX` saturate so the TTL policy can cap them.
    #[serde(
        default,
        deserialize_with = "deserialize_ttl",
        skip_serializing_if = "Option::is_none"
    )]
    pub ttl_seconds: Option<i64>,
}

impl TxnRequest {
    pub fn start() -> Self {
        Self {
            action: TxnAction::Start,
            token: None,
            payload: None,
            ttl_seconds: None,
        }
    }

    pub fn resume(token: impl Into<String>) -> Self {
        Self {
            action: TxnAction::Resume,
            token: Some(token.into()),
            payload: None,
            ttl_seconds: None,
        }
    }

    pub fn close(token: impl Into<String>) -> Self {
        Self {
            action: TxnAction::Close,
            token: Some(token.into()),
            payload: None,
            ttl_seconds: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The caller's token, with empty strings treated as missing.
    pub fn supplied_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Outcome of an action. Not a persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnStatus {
    Pending,
    Closed,
    Error,
}

/// Transaction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxnResponse {
    pub status: TxnStatus,

    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, serialize_with = "serialize_expiry")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl TxnResponse {
    pub fn pending(token: impl Into<String>, payload: Value, expires_at: DateTime<Utc>) -> Self {
        Self {
            status: TxnStatus::Pending,
            token: token.into(),
            payload: Some(payload),
            expires_at: Some(expires_at),
            error: None,
            error_kind: None,
        }
    }

    pub fn closed(token: impl Into<String>) -> Self {
        Self {
            status: TxnStatus::Closed,
            token: token.into(),
            payload: None,
            expires_at: None,
            error: None,
            error_kind: None,
        }
    }

    /// Error response for `token` (or [`UNKNOWN_TOKEN`]).
    pub fn from_error(token: Option<&str>, err: &TxnError) -> Self {
        Self {
            status: TxnStatus::Error,
            token: token.unwrap_or(UNKNOWN_TOKEN).to_string(),
            payload: None,
            expires_at: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

fn deserialize_ttl<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(ttl) = number.as_i64() {
        return Ok(Some(ttl));
    }
    if number.is_u64() {
        return Ok(Some(i64::MAX));
    }
    Err(de::Error::invalid_type(
        de::Unexpected::Float(number.as_f64().unwrap_or_default()),
        &"an integer number of seconds",
    ))
}

/// ISO-8601 with millisecond precision and a `Z` suffix, or `null`.
fn serialize_expiry<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_none(),
    }
}
