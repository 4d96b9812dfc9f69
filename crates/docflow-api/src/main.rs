//! API gateway entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use docflow_api::{ApiConfig, AppState, StaticTokenAuth, build_router};
use docflow_api::images::{ImageUploader, ObjectStoreConfig};
use docflow_queue::{QueueConfig, TaskQueue};

#[derive(Parser, Debug)]
#[command(name = "docflow-api", about = "docflow REST gateway")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    port: u16,

    /// Task queue database path
    #[arg(long, env = "DOCFLOW_DB", default_value = "docflow_tasks.db")]
    db: PathBuf,

    /// Root directory of per-task result directories
    #[arg(long, env = "OUTPUT_PATH", default_value = "/tmp/docflow_output")]
    output_root: PathBuf,

    /// Shared directory where inbound uploads land
    #[arg(long, env = "DOCFLOW_UPLOAD_DIR", default_value = "/tmp/docflow_uploads")]
    upload_dir: PathBuf,

    /// JSON file with the static bearer-token table
    #[arg(long, env = "DOCFLOW_AUTH_TOKENS_FILE")]
    auth_tokens_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    tokio::fs::create_dir_all(&args.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {:?}", args.upload_dir))?;
    tokio::fs::create_dir_all(&args.output_root)
        .await
        .with_context(|| format!("Failed to create output root {:?}", args.output_root))?;

    let queue = TaskQueue::connect(QueueConfig {
        database_path: args.db.clone(),
        ..QueueConfig::default()
    })
    .await
    .context("Failed to open task queue database")?;

    let auth = match &args.auth_tokens_file {
        Some(path) => StaticTokenAuth::from_file(path)
            .map_err(|e| anyhow::anyhow!("{}", e))?
            .into_provider(),
        None => {
            warn!("No auth token file configured; every request will be rejected");
            StaticTokenAuth::new().into_provider()
        }
    };

    let images = match ObjectStoreConfig::from_env() {
        Some(config) => Some(Arc::new(ImageUploader::connect(config).await)),
        None => {
            info!("Object store not configured; image upload rewriting disabled");
            None
        }
    };

    let state = AppState {
        queue,
        engines: Arc::new(docflow_engine::standard_registry()),
        auth,
        images,
        config: Arc::new(ApiConfig {
            upload_dir: args.upload_dir,
            output_root: args.output_root,
        }),
    };

    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let Ok(mut term) = signal(SignalKind::terminate()) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
