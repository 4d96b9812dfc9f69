//! Worker pool entry point.
//!
//! One process serves one compute device; run one process per GPU (or CPU)
//! and scale loops within the process via `--workers-per-device`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use docflow_queue::{QueueConfig, TaskQueue};
use docflow_worker::{Device, WorkerConfig, WorkerPool};

#[derive(Parser, Debug)]
#[command(name = "docflow-worker", about = "docflow task worker pool")]
struct Args {
    /// Task queue database path
    #[arg(long, env = "DOCFLOW_DB", default_value = "docflow_tasks.db")]
    db: PathBuf,

    /// Root directory for per-task result directories
    #[arg(long, env = "OUTPUT_PATH", default_value = "/tmp/docflow_output")]
    output_root: PathBuf,

    /// Device to bind this process to: cpu, cuda:N or N
    #[arg(long, env = "DOCFLOW_DEVICE", default_value = "cpu")]
    device: String,

    /// Number of worker loops sharing the bound device
    #[arg(long, env = "DOCFLOW_WORKERS_PER_DEVICE", default_value_t = 1)]
    workers_per_device: usize,

    /// Idle delay between queue polls, in milliseconds
    #[arg(long, env = "DOCFLOW_POLL_INTERVAL_MS", default_value_t = 500)]
    poll_interval_ms: u64,

    /// Prefix for worker ids
    #[arg(long, env = "DOCFLOW_WORKER_PREFIX", default_value = "docflow")]
    worker_prefix: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let device: Device = args
        .device
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    // Bind the device while the process is still single-threaded, before the
    // runtime spawns threads and before any engine is constructed.
    device.bind();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(run(args, device))
}

async fn run(args: Args, device: Device) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&args.output_root)
        .await
        .with_context(|| format!("Failed to create output root {:?}", args.output_root))?;

    let queue = TaskQueue::connect(QueueConfig {
        database_path: args.db.clone(),
        ..QueueConfig::default()
    })
    .await
    .context("Failed to open task queue database")?;

    let engines = Arc::new(docflow_engine::standard_registry());
    for engine in engines.snapshot() {
        info!(
            engine = %engine.name,
            available = engine.available,
            "Engine registered"
        );
    }

    let config = WorkerConfig {
        worker_id_prefix: args.worker_prefix,
        device,
        workers_per_device: args.workers_per_device,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        output_root: args.output_root,
    };
    let pool = WorkerPool::spawn(&config, queue, engines);

    shutdown_signal().await?;
    info!("Shutdown signal received, draining workers");
    pool.shutdown().await;

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
