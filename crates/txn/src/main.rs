//! Transaction manager launcher
//!
//! Opens the configured TTL store, starts the expiry sweeper and serves the
//! `transaction` MCP tool over stdio until stdin closes or SIGINT/SIGTERM
//! arrives. The store is closed on the way out.

use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use txn_core::TransactionCoordinator;
use txn_ids::UuidTokenGenerator;
use txn_mcp::{McpServer, McpServerConfig, ToolError, ToolRegistry};
use txn_store::{open_store, spawn_sweeper, StoreUrl, TtlStore};

mod config;

use config::{Overrides, TxnConfig};

#[derive(Parser, Debug)]
#[command(
    name = "txn",
    version,
    about = "Ephemeral transaction token service (MCP over stdio)"
)]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Config file (default: $TXN_HOME/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store URL: sqlite:<path>, sqlite::memory: or memory:
    #[arg(long, env = "TXN_STORE_URL")]
    store_url: Option<String>,

    /// TTL in seconds when a request names none
    #[arg(long)]
    default_ttl: Option<u64>,

    /// Upper bound on requested TTLs, in seconds
    #[arg(long)]
    max_ttl: Option<u64>,

    /// Seconds between expired-record sweeps (0 disables)
    #[arg(long)]
    sweep_interval: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = txn_logging::init_logging(txn_logging::LogConfig {
        app_name: "txn",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: {:#}", err);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A blocked stdin read would otherwise hold the runtime open.
    runtime.shutdown_timeout(Duration::from_secs(1));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let home = txn_logging::txn_home();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config::config_path(&home));

    let mut config = TxnConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config
        .apply(Overrides {
            store_url: cli.store_url,
            default_ttl_seconds: cli.default_ttl,
            max_ttl_seconds: cli.max_ttl,
            sweep_interval_seconds: cli.sweep_interval,
        })
        .context("Invalid configuration")?;

    let url = StoreUrl::parse(&config.store_url(&home)).context("Invalid store URL")?;
    let store = open_store(&url, config.retry_config())
        .await
        .with_context(|| format!("Failed to open store {}", url))?;
    info!("Using {} store at {}", store.backend_name(), url);

    let sweeper = config
        .sweep_interval()
        .map(|interval| spawn_sweeper(Arc::clone(&store), interval));

    let ttl = config.ttl_policy().context("Invalid TTL policy")?;
    let tokens = Arc::new(UuidTokenGenerator::with_prefix(config.token_prefix.clone()));
    let coordinator = TransactionCoordinator::new(Arc::clone(&store), tokens, ttl);

    let mut server = McpServer::new(
        McpServerConfig::default(),
        ToolRegistry::with_coordinator(coordinator),
    );
    info!(
        "Transaction manager ready (default TTL {}s, max TTL {}s)",
        ttl.default_ttl(),
        ttl.max_ttl()
    );

    let result = serve_until(server.run_stdio(), shutdown_signal()).await;
    close_store(store, sweeper).await;
    result
}

/// Run `serve` until it returns or `shutdown` fires.
async fn serve_until<F, S>(serve: F, shutdown: S) -> Result<()>
where
    F: Future<Output = std::result::Result<(), ToolError>>,
    S: Future<Output = &'static str>,
{
    tokio::select! {
        result = serve => result.context("MCP server failed"),
        signal = shutdown => {
            info!("Received {}, shutting down", signal);
            Ok(())
        }
    }
}

/// Stop the sweeper, then release the store's connections.
async fn close_store(store: Arc<dyn TtlStore>, sweeper: Option<JoinHandle<()>>) {
    if let Some(sweeper) = sweeper {
        sweeper.abort();
        let _ = sweeper.await;
    }
    store.close().await;
    info!("Transaction store closed");
}

/// Resolves with the name of the first termination signal received.
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            return interrupt().await;
        }
    };

    tokio::select! {
        name = interrupt() => name,
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    interrupt().await
}

async fn interrupt() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for SIGINT: {}", e);
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
