//! Service configuration
//!
//! Reads settings from `$TXN_HOME/config.toml` (default `~/.txn_manager`).
//! Every field is optional; a missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use txn_core::{InvalidTtlPolicy, TtlPolicy, DEFAULT_TTL_SECONDS, MAX_TTL_SECONDS};
use txn_ids::TOKEN_PREFIX;
use txn_store::RetryConfig;

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Path of the config file under `home`
pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Default store: a SQLite file next to the config
pub fn default_store_url(home: &Path) -> String {
    format!("sqlite:{}", home.join("transactions.sqlite").display())
}

/// Top-level config.toml contents
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TxnConfig {
    /// Store URL (`sqlite:<path>`, `sqlite::memory:` or `memory:`)
    #[serde(default)]
    pub store_url: Option<String>,

    /// TTL applied when a request names none
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Upper bound on any requested TTL
    #[serde(default = "max_ttl_seconds")]
    pub max_ttl_seconds: u64,

    /// Namespace prefix for issued tokens
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,

    /// Seconds between expired-record sweeps (0 disables the sweeper)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            default_ttl_seconds: default_ttl_seconds(),
            max_ttl_seconds: max_ttl_seconds(),
            token_prefix: default_token_prefix(),
            sweep_interval_seconds: default_sweep_interval(),
            retry: RetrySettings::default(),
        }
    }
}

/// Store retry settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff grows by this much per attempt
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            step_ms: default_step_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn max_ttl_seconds() -> u64 {
    MAX_TTL_SECONDS
}

fn default_token_prefix() -> String {
    TOKEN_PREFIX.to_string()
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_step_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    2000
}

/// Values supplied on the command line (or through their environment variables)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub store_url: Option<String>,
    pub default_ttl_seconds: Option<u64>,
    pub max_ttl_seconds: Option<u64>,
    pub sweep_interval_seconds: Option<u64>,
}

impl TxnConfig {
    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply command-line values on top of the file
    pub fn apply(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(url) = overrides.store_url {
            self.store_url = Some(url);
        }
        if let Some(ttl) = overrides.default_ttl_seconds {
            self.default_ttl_seconds = ttl;
        }
        if let Some(ttl) = overrides.max_ttl_seconds {
            self.max_ttl_seconds = ttl;
        }
        if let Some(interval) = overrides.sweep_interval_seconds {
            self.sweep_interval_seconds = interval;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.token_prefix.is_empty() {
            return Err(ConfigError::Invalid("token_prefix must not be empty".into()));
        }
        if let Some(url) = &self.store_url {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid("store_url must not be empty".into()));
            }
        }
        self.ttl_policy()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Store URL, defaulting to the SQLite file under `home`
    pub fn store_url(&self, home: &Path) -> String {
        self.store_url
            .clone()
            .unwrap_or_else(|| default_store_url(home))
    }

    pub fn ttl_policy(&self) -> std::result::Result<TtlPolicy, InvalidTtlPolicy> {
        TtlPolicy::new(self.default_ttl_seconds, self.max_ttl_seconds)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            step: Duration::from_millis(self.retry.step_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Sweep interval, or None when sweeping is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }
}
