//! Worker pool: spawning and graceful shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use docflow_engine::EngineRegistry;
use docflow_queue::TaskQueue;

use crate::config::WorkerConfig;
use crate::worker::Worker;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    grace: std::time::Duration,
}

impl WorkerPool {
    /// Spawn `workers_per_device` loops on the process's bound device.
    ///
    /// Worker ids are `{prefix}-{host}-{device}-{pid}-{slot}`; the slot
    /// suffix keeps ids unique when several loops share one device within a
    /// process, which the completion guard in the queue relies on.
    pub fn spawn(config: &WorkerConfig, queue: TaskQueue, engines: Arc<EngineRegistry>) -> Self {
        let cancel = CancellationToken::new();
        let host = gethostname::gethostname().to_string_lossy().into_owned();
        let pid = std::process::id();
        let device = config.device.label();

        let mut handles = Vec::with_capacity(config.workers_per_device);
        for slot in 0..config.workers_per_device {
            let worker_id = format!(
                "{}-{}-{}-{}-{}",
                config.worker_id_prefix, host, device, pid, slot
            );
            let worker = Worker::new(
                worker_id,
                queue.clone(),
                Arc::clone(&engines),
                config.output_root.clone(),
                config.poll_interval,
                cancel.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        info!(
            workers = handles.len(),
            device = %device,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "Worker pool started"
        );

        Self {
            handles,
            cancel,
            // Forced termination is permitted after twice the poll interval.
            grace: config.poll_interval * 2,
        }
    }

    /// Stop leasing, let in-flight tasks finish within the grace period,
    /// then abort whatever is left.
    pub async fn shutdown(self) {
        info!("Shutting down worker pool");
        self.cancel.cancel();

        for mut handle in self.handles {
            if tokio::time::timeout(self.grace, &mut handle).await.is_err() {
                warn!("Worker did not stop within grace period, aborting");
                handle.abort();
            }
        }

        info!("Worker pool stopped");
    }
}
