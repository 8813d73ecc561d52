//! Error types for the store layer.

use thiserror::Error;

/// Store operation result type.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached (pool exhausted, connection dropped, I/O).
    #[error("Store unavailable: {0}")]
    Connection(String),

    /// The store answered but the operation failed.
    #[error("Store operation failed: {0}")]
    Backend(String),

    /// The value could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store URL is not understood.
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => Self::Connection(err.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::connection("refused").is_transient());
        assert!(!StoreError::backend("syntax").is_transient());
        assert!(!StoreError::InvalidUrl("x".into()).is_transient());
    }

    #[test]
    fn test_sqlx_pool_errors_are_transient() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StoreError::from(sqlx::Error::PoolClosed).is_transient());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
    }
}
