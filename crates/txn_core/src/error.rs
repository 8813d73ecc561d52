//! Error taxonomy for transaction handling.
//!
//! Two kinds only: client mistakes, returned as-is and never retried, and
//! infrastructure failures from the store.

use crate::types::TxnAction;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use txn_store::StoreError;

/// Errors caused by the request itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request does not match the expected shape.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// `start` was called with a token.
    #[error("Token should not be provided for the \"start\" action.")]
    TokenForbidden,

    /// `resume`/`close` was called without a token.
    #[error("Token is required for the \"{0}\" action.")]
    TokenRequired(TxnAction),

    /// No live record for the token.
    #[error("Transaction token \"{0}\" not found or expired.")]
    NotFound(String),
}

/// Transaction error.
#[derive(Debug, Error)]
pub enum TxnError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Transaction store failure during {action}: {source}")]
    Infrastructure {
        action: TxnAction,
        #[source]
        source: StoreError,
    },
}

impl TxnError {
    pub fn infrastructure(action: TxnAction, source: StoreError) -> Self {
        Self::Infrastructure { action, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client(_) => ErrorKind::Client,
            Self::Infrastructure { .. } => ErrorKind::Infrastructure,
        }
    }

    /// Client errors will fail the same way again; store failures may not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure { .. })
    }
}

/// Which side of the boundary an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Client,
    Infrastructure,
}

/// Rejected TTL bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid TTL policy: default {default_ttl}s must be within 1..={max_ttl}s")]
pub struct InvalidTtlPolicy {
    pub default_ttl: u64,
    pub max_ttl: u64,
}
