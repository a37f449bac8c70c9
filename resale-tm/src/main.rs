//! resale-tm - Resale tier manager
//!
//! Serves the tier manager HTTP API, or with `--rebalance-once` /
//! `--audit-once` runs a single pass for cron and exits.

use anyhow::{Context, Result};
use clap::Parser;
use resale_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver};
use resale_common::events::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use resale_tm::audit::{drive_scan, HttpImageProbe, ScanEvent};
use resale_tm::{AppState, MODULE_NAME};

#[derive(Debug, Parser)]
#[command(name = "resale-tm", version, about = "Resale catalog tier manager")]
struct Args {
    /// Root folder holding resale.db (overrides environment and config file)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "RESALE_TM_BIND")]
    bind: Option<String>,

    /// Run one rebalance pass, print the summary as JSON and exit
    #[arg(long, conflicts_with = "audit_once")]
    rebalance_once: bool,

    /// Run one full audit scan, print the outcome as JSON and exit
    #[arg(long)]
    audit_once: bool,

    /// Re-check items even if checked recently (with --audit-once)
    #[arg(long, requires = "audit_once")]
    force: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(level: &str, file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;
        }
        None => builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let defaults = CompiledDefaults::for_current_platform();

    let resolver = RootFolderResolver::new(MODULE_NAME).with_cli_override(args.root_folder.clone());
    let toml_config = resolver.load_toml().unwrap_or_default();

    let log_level = args.log_level.clone().unwrap_or_else(|| toml_config.logging.level.clone());
    let log_file = toml_config.logging.file.clone().or(defaults.log_file.clone());
    init_tracing(&log_level, log_file.as_ref())?;

    info!("Starting {} (tier manager)", MODULE_NAME);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve and create the root folder
    let root_folder = resolver.resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 2: Open or create the database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = resale_common::db::init_database(&db_path).await?;

    // Step 3: Shared state
    let probe_timeout = resale_tm::db::settings::get_probe_timeout_ms(&db_pool).await?;
    let probe = HttpImageProbe::new(Duration::from_millis(probe_timeout))
        .map_err(|e| anyhow::anyhow!("Failed to build image probe: {}", e))?;
    let event_bus = EventBus::new(100);
    let state = AppState::new(db_pool, event_bus, Arc::new(probe));

    if args.rebalance_once {
        let summary = state.rebalancer.run(resale_common::time::now()).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if args.audit_once {
        let cancel = CancellationToken::new();
        let ctrl_c_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_token.cancel();
            }
        });

        let outcome = drive_scan(&state.scanner, None, args.force, &cancel, |event| {
            if let ScanEvent::Complete { next_offset, total, .. } = event {
                info!("Audit progress: {}/{}", next_offset, total);
            }
        })
        .await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let bind = args
        .bind
        .or(toml_config.server.bind)
        .unwrap_or(defaults.bind);

    let app = resale_tm::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
