//! # Worker Runtime
//!
//! A pool of long-lived workers, each running an independent
//! poll-lease-execute loop against the shared task queue. The process is
//! bound to a single compute device before any engine is constructed;
//! contention for work is resolved entirely by the queue's atomic lease, so
//! there is no central scheduler.
//!
//! Shutdown is cooperative: INT/TERM cancels the pool's token, each worker
//! finishes its in-flight task, and the pool joins the loops with a bounded
//! grace period.

pub mod config;
pub mod device;
pub mod pool;
pub mod worker;

pub use config::WorkerConfig;
pub use device::Device;
pub use pool::WorkerPool;
pub use worker::Worker;
