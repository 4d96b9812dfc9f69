//! Compute-device binding.
//!
//! A worker process serves exactly one device. Binding restricts the
//! process's accelerator visibility before any engine is constructed, so
//! downstream libraries and child processes cannot allocate memory on
//! sibling GPUs; after binding, the logical device index inside the process
//! is always zero.

use std::str::FromStr;

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(u32),
}

impl Device {
    /// Short label used in worker ids, e.g. `cpu` or `cuda0`.
    pub fn label(&self) -> String {
        match self {
            Device::Cpu => "cpu".to_string(),
            Device::Cuda(index) => format!("cuda{}", index),
        }
    }

    /// Pin this process (and every child it spawns) to the device.
    ///
    /// Must be called from `main` before the async runtime starts: it
    /// mutates the process environment, which is only sound while the
    /// process is still single-threaded.
    pub fn bind(&self) {
        match self {
            Device::Cuda(index) => {
                // Physical GPU {index} becomes logical GPU 0 for this process.
                unsafe {
                    std::env::set_var("CUDA_VISIBLE_DEVICES", index.to_string());
                    std::env::set_var("DOCFLOW_DEVICE_MODE", "cuda:0");
                }
                info!(physical_gpu = index, "Bound process to CUDA device (logical index 0)");
            }
            Device::Cpu => {
                unsafe {
                    std::env::set_var("DOCFLOW_DEVICE_MODE", "cpu");
                }
                info!("Bound process to CPU");
            }
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "cpu" {
            return Ok(Device::Cpu);
        }
        let index = s
            .strip_prefix("cuda:")
            .or_else(|| s.strip_prefix("cuda"))
            .unwrap_or(&s);
        index
            .parse::<u32>()
            .map(Device::Cuda)
            .map_err(|_| format!("Invalid device '{}': expected 'cpu', 'cuda:N' or 'N'", s))
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}
