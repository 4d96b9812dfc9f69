//! Worker pool configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::device::Device;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Prefix for worker ids (`{prefix}-{host}-{device}-{pid}-{slot}`)
    pub worker_id_prefix: String,
    /// The single device this process is bound to
    pub device: Device,
    /// Number of worker loops sharing the bound device
    pub workers_per_device: usize,
    /// Idle delay between `lease_next` polls
    pub poll_interval: Duration,
    /// Root directory for per-task result directories
    pub output_root: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id_prefix: "docflow".to_string(),
            device: Device::Cpu,
            workers_per_device: 1,
            poll_interval: Duration::from_millis(500),
            output_root: PathBuf::from("/tmp/docflow_output"),
        }
    }
}
