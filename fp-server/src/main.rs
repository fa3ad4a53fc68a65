//! fp-server - feed, play ledger and resume store
//!
//! Serves the publication feed with alphabetical or engagement ordering,
//! attributes plays with a per-viewer dedup window and stores resume offsets.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fp_common::auth::{issue_token, load_shared_secret};
use fp_common::config::{ServerConfig, TomlConfig};
use fp_common::db::init_database;
use fp_server::seed::{apply_seed, SeedFile};
use fp_server::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Command-line arguments for fp-server
#[derive(Parser, Debug)]
#[command(name = "fp-server")]
#[command(about = "Feed, play ledger and resume store server")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "FP_PORT")]
    port: Option<u16>,

    /// Root folder holding feedplay.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file of users and tracks to import before serving
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Print a bearer token for this viewer id and exit
    #[arg(long, value_name = "VIEWER_ID")]
    issue_token: Option<Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fp_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting fp-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default(args.config.as_deref());
    let config = ServerConfig::resolve(args.root_folder.as_deref(), args.port, &toml_config);

    std::fs::create_dir_all(&config.root_folder).with_context(|| {
        format!("Failed to create root folder {}", config.root_folder.display())
    })?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let shared_secret = load_shared_secret(&pool)
        .await
        .context("Failed to load API shared secret")?;

    if let Some(viewer_id) = args.issue_token {
        println!("{}", issue_token(&viewer_id, shared_secret));
        return Ok(());
    }

    if let Some(seed_path) = &args.seed {
        let seed = SeedFile::load(seed_path).context("Failed to read seed file")?;
        apply_seed(&pool, seed).await.context("Failed to apply seed")?;
    }

    info!(
        dedup_window_hours = config.dedup_window_hours,
        max_play_weight = config.max_play_weight,
        ledger_max_attempts = config.ledger_max_attempts,
        "Play ledger configured"
    );

    let state = AppState::from_config(pool, shared_secret, &config);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("fp-server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
