//! Transaction tokens.
//!
//! A token names one transaction record in the shared TTL store. Tokens double
//! as bearer credentials for resuming or closing a transaction, so they are
//! built from random UUIDv4 values and never from a counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace prepended to every generated token.
pub const TOKEN_PREFIX: &str = "txn:";

/// Error returned when a caller-supplied token is not a well-formed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParseError {
    message: String,
}

impl TokenParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TokenParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TokenParseError {}

/// Opaque, namespaced transaction token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnToken(String);

impl TxnToken {
    /// Validate a caller-supplied token against a namespace prefix.
    ///
    /// Only the prefix is checked; the remainder stays opaque.
    pub fn parse(value: &str, prefix: &str) -> Result<Self, TokenParseError> {
        let rest = value.strip_prefix(prefix).ok_or_else(|| {
            TokenParseError::new(format!(
                "Invalid transaction token \"{}\": expected prefix \"{}\"",
                value, prefix
            ))
        })?;
        if rest.trim().is_empty() {
            return Err(TokenParseError::new(format!(
                "Invalid transaction token \"{}\": empty identifier",
                value
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TxnToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TxnToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh transaction tokens.
pub trait TokenGenerator: Send + Sync {
    /// Produce a new, unpredictable token.
    fn generate(&self) -> TxnToken;

    /// Namespace every token from this generator starts with.
    fn prefix(&self) -> &str;
}

/// Generates `<prefix><uuid-v4>` tokens.
#[derive(Debug, Clone)]
pub struct UuidTokenGenerator {
    prefix: String,
}

impl UuidTokenGenerator {
    pub fn new() -> Self {
        Self::with_prefix(TOKEN_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UuidTokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator for UuidTokenGenerator {
    fn generate(&self) -> TxnToken {
        TxnToken(format!("{}{}", self.prefix, Uuid::new_v4()))
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}
