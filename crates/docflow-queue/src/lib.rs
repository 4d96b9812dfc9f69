//! # Durable Task Queue
//!
//! SQLite-backed priority queue for document-processing tasks. The queue is
//! the sole source of truth for task state: the API gateway inserts rows,
//! workers lease and complete them, and administrative sweeps recover stale
//! leases and prune old terminal rows.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docflow_queue::{NewTask, TaskQueue};
//!
//! # async fn example() -> Result<(), docflow_queue::QueueError> {
//! let queue = TaskQueue::connect_in_memory().await?;
//!
//! let task_id = queue
//!     .create(NewTask {
//!         file_name: "report.pdf".into(),
//!         file_path: "/data/uploads/abc_report.pdf".into(),
//!         backend: "pipeline".into(),
//!         options: serde_json::json!({"lang": "en"}),
//!         priority: 0,
//!         user_id: "user-1".into(),
//!     })
//!     .await?;
//!
//! // A worker claims the highest-priority pending task.
//! let leased = queue.lease_next("worker-a").await?;
//! assert_eq!(leased.unwrap().task_id, task_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`TaskQueue`**: connection pool plus every queue operation, each a
//!   single transaction
//! - **`TaskRecord`**: persistence model (serializable, no runtime handles)
//! - **State machine**: validates transitions along the task lifecycle DAG

pub mod error;
pub mod state_machine;
pub mod store;
pub mod task;

pub use error::QueueError;
pub use state_machine::{is_terminal, validate_transition};
pub use store::{QueueConfig, QueueStats, RemovedTask, TaskFilter, TaskQueue};
pub use task::{NewTask, TaskRecord, TaskStatus};
