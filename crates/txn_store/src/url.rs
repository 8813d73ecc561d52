//! Store URL parsing.

use crate::error::{StoreError, StoreResult};
use std::fmt;
use std::path::PathBuf;

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
    /// Process-local map. Records do not survive a restart.
    Memory,
    /// Private in-memory SQLite database.
    SqliteMemory,
    /// SQLite database file.
    Sqlite(PathBuf),
}

impl StoreUrl {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let raw = raw.trim();
        if raw == "memory:" || raw == "memory://" {
            return Ok(Self::Memory);
        }
        if raw == "sqlite::memory:" {
            return Ok(Self::SqliteMemory);
        }
        if let Some(rest) = raw.strip_prefix("sqlite:") {
            let path = rest.trim_start_matches("//").trim();
            if path.is_empty() {
                return Err(StoreError::InvalidUrl(format!(
                    "sqlite URL missing path: {raw}"
                )));
            }
            return Ok(Self::Sqlite(PathBuf::from(path)));
        }
        Err(StoreError::InvalidUrl(format!(
            "Unsupported store URL: {raw} (expected memory:, sqlite::memory: or sqlite:<path>)"
        )))
    }
}

impl std::str::FromStr for StoreUrl {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StoreUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory:"),
            Self::SqliteMemory => write!(f, "sqlite::memory:"),
            Self::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        assert_eq!(StoreUrl::parse("memory:").unwrap(), StoreUrl::Memory);
        assert_eq!(
            StoreUrl::parse("sqlite::memory:").unwrap(),
            StoreUrl::SqliteMemory
        );
        assert_eq!(
            StoreUrl::parse("sqlite:/tmp/txn.sqlite").unwrap(),
            StoreUrl::Sqlite(PathBuf::from("/tmp/txn.sqlite"))
        );
        assert_eq!(
            StoreUrl::parse("sqlite:///tmp/txn.sqlite").unwrap(),
            StoreUrl::Sqlite(PathBuf::from("/tmp/txn.sqlite"))
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            StoreUrl::parse("redis://localhost"),
            Err(StoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            StoreUrl::parse("sqlite:"),
            Err(StoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_display_round_trips() {
        let url = StoreUrl::parse("sqlite:/var/lib/txn.sqlite").unwrap();
        assert_eq!(url.to_string(), "sqlite:/var/lib/txn.sqlite");
        assert_eq!(StoreUrl::parse(&url.to_string()).unwrap(), url);
    }
}
