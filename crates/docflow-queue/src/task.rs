//! Task data model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueueError;

/// Lifecycle status of a task.
///
/// Transitions are confined to the DAG enforced by [`crate::state_machine`]:
/// `Pending -> Processing -> {Completed, Failed}`, `Pending -> Cancelled`,
/// and `Processing -> Pending` only through stale-lease recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];
}

impl std::str::FromStr for TaskStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(QueueError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence model for a task row.
///
/// Contains only serializable fields; runtime handles (engine instances,
/// cancellation tokens) live with the worker that leased the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique task identifier assigned on submission
    pub task_id: String,
    /// Submitting principal; governs visibility
    pub user_id: String,
    /// Original filename as submitted
    pub file_name: String,
    /// Location of the inbound payload on shared storage
    pub file_path: String,
    /// Requested engine selector (a recognized engine name or `auto`)
    pub backend: String,
    /// Engine-specific parameters, preserved verbatim from submission
    pub options: Value,
    /// Higher priority is dispatched sooner; `created_at` breaks ties
    pub priority: i64,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Worker currently holding or having last touched the task
    pub worker_id: Option<String>,
    /// Number of re-leases after stale-lease recovery
    pub retry_count: i64,
    /// Directory containing output artifacts; set on completion
    pub result_path: Option<String>,
    /// Human-readable diagnostic; set on failure
    pub error_message: Option<String>,
    /// ISO 8601 datetime when the task was created
    pub created_at: String,
    /// ISO 8601 datetime when the current (or last) lease began
    pub started_at: Option<String>,
    /// ISO 8601 datetime when the task reached a terminal state
    pub completed_at: Option<String>,
}

/// Fields supplied by the submitter; everything else is stamped on insert.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub file_name: String,
    pub file_path: String,
    pub backend: String,
    pub options: Value,
    pub priority: i64,
    pub user_id: String,
}
