//! tkm-recon - Roster reconciliation microservice
//!
//! Accepts a document bundle per session, matches uploaded rosters against
//! it, and queues ambiguous matches for human resolution.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tkm_common::config::{default_config_path, load_toml_config, RootFolderResolver};
use tkm_common::SystemClock;
use tkm_recon::config::ServiceConfig;
use tkm_recon::services::WorkflowOrchestrator;
use tkm_recon::AppState;

/// Command-line arguments for tkm-recon
#[derive(Parser, Debug)]
#[command(name = "tkm-recon")]
#[command(about = "Roster-to-document reconciliation service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TKM_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(short, long, env = "TKM_BIND_ADDRESS")]
    bind: Option<String>,

    /// Root folder for uploads, extracted bundles and output bundles
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = "TKM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => Default::default(),
    };

    // Initialize tracing
    let level = toml_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tkm_recon={level},tkm_common={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tkm-recon (roster reconciliation) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let resolver = RootFolderResolver::new("TKM_ROOT_FOLDER");
    let root_folder = resolver.resolve(args.root_folder.as_deref(), &toml_config);
    let config = ServiceConfig::new(root_folder, &toml_config);
    config
        .areas
        .ensure()
        .context("Failed to initialize working areas")?;

    let workflow = Arc::new(
        WorkflowOrchestrator::new(config.clone(), Arc::new(SystemClock))
            .context("Failed to initialize reconciliation workflow")?,
    );
    let state = AppState::new(Arc::clone(&workflow));

    spawn_sweeper(state.clone(), config.sweep_interval);
    info!(
        "Retention: {} h, sweep every {} min",
        config.retention.as_secs() / 3600,
        config.sweep_interval.as_secs() / 60
    );

    let app = tkm_recon::build_router(state);

    let bind = args.bind.unwrap_or(toml_config.bind_address);
    let port = args.port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Periodic retention sweep
fn spawn_sweeper(state: AppState, period: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick completes immediately; sweep leftovers from a previous run
        loop {
            interval.tick().await;
            let report = state.workflow.sweep().await;
            if report.failures > 0 {
                state
                    .record_error(format!("Retention sweep: {} paths could not be deleted", report.failures))
                    .await;
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
