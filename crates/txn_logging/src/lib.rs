//! Shared logging setup for the transaction manager binaries.
//!
//! stdout carries the JSON-RPC stream, so console output always goes to stderr.

mod rolling;

use anyhow::{Context, Result};
use rolling::{RollingLog, RotationPolicy};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "txn=info,txn_core=info,txn_store=info,txn_mcp=info";
const VERBOSE_LOG_FILTER: &str = "txn=debug,txn_core=debug,txn_store=debug,txn_mcp=debug";
const ROTATION: RotationPolicy = RotationPolicy {
    keep: 5,
    max_bytes: 10 * 1024 * 1024,
};

/// Logging configuration shared by the binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// If the log directory cannot be created, logging falls back to stderr only.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        file_filter.clone()
    };

    let file_layer = match open_log_file(config.app_name) {
        Ok(log) => Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log))
                .with_ansi(false)
                .with_filter(file_filter),
        ),
        Err(err) => {
            eprintln!("Warning: file logging disabled: {:#}", err);
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn open_log_file(app_name: &str) -> Result<RollingLog> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    RollingLog::open(&log_dir, app_name, ROTATION)
        .with_context(|| format!("Failed to open log file for {}", app_name))
}

/// Get the transaction manager home directory.
///
/// Priority:
/// 1) TXN_HOME
/// 2) ~/.txn_manager
/// 3) ./.txn_manager
pub fn txn_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("TXN_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".txn_manager")
}

/// Get the logs directory: ~/.txn_manager/logs
pub fn logs_dir() -> PathBuf {
    txn_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}
