//! SQLite-backed queue store.
//!
//! Single `tasks` table plus dispatch and ownership indices. The store may be
//! shared by the API process and any number of worker processes on the same
//! host; every operation is one transaction and concurrent writers serialize
//! through SQLite's locking.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::state_machine;
use crate::task::{NewTask, TaskRecord, TaskStatus};

/// Configuration for the SQLite queue store.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Database file path (use ":memory:" for in-memory)
    pub database_path: PathBuf,
    /// Maximum number of database connections in the pool
    pub max_connections: u32,
    /// How long a writer waits on a locked database before erroring
    pub busy_timeout_secs: u64,
    /// Create database file if it doesn't exist
    pub create_database_if_missing: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("docflow_tasks.db"),
            max_connections: 5,
            busy_timeout_secs: 30,
            create_database_if_missing: true,
        }
    }
}

/// Per-status row counts, as served by `/queue/stats` and `/health`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl QueueStats {
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed + self.cancelled
    }
}

/// Filter for `list`; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub user_id: Option<String>,
}

/// A row removed by `cleanup_old`, carrying the result directory (if any)
/// so the caller can sweep the matching on-disk artifacts.
#[derive(Debug, Clone)]
pub struct RemovedTask {
    pub task_id: String,
    pub result_path: Option<String>,
}

/// SQLite-backed task queue.
#[derive(Clone)]
pub struct TaskQueue {
    pool: SqlitePool,
}

const TASK_COLUMNS: &str = "task_id, user_id, file_name, file_path, backend, options, priority, \
     status, worker_id, retry_count, result_path, error_message, \
     created_at, started_at, completed_at";

fn row_to_task_record(row: sqlx::sqlite::SqliteRow) -> Result<TaskRecord, QueueError> {
    let status_str: String = row.get("status");
    let status: TaskStatus = status_str.parse()?;

    let options_str: String = row.get("options");
    let options = serde_json::from_str(&options_str)?;

    Ok(TaskRecord {
        task_id: row.get("task_id"),
        user_id: row.get("user_id"),
        file_name: row.get("file_name"),
        file_path: row.get("file_path"),
        backend: row.get("backend"),
        options,
        priority: row.get("priority"),
        status,
        worker_id: row.get("worker_id"),
        retry_count: row.get("retry_count"),
        result_path: row.get("result_path"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    })
}

impl TaskQueue {
    /// Open (or create) the queue database at the configured path.
    pub async fn connect(config: QueueConfig) -> Result<Self, QueueError> {
        info!("Opening task queue database at {:?}", config.database_path);

        let db_path_str = config.database_path.to_string_lossy();
        let is_memory = db_path_str == ":memory:";

        if !is_memory {
            if let Some(parent) = config.database_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    QueueError::DatabaseError(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let pool = if is_memory {
            // Connect via URI with a unique name and shared cache so all pool
            // connections see the same database instance.
            let unique_name = uuid::Uuid::now_v7();
            let uri = format!("file:{}?mode=memory&cache=shared", unique_name);
            SqlitePool::connect(&uri)
                .await
                .map_err(|e| QueueError::DatabaseError(e.to_string()))?
        } else {
            let connect_options = SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(config.create_database_if_missing)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(config.busy_timeout_secs));
            sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(connect_options)
                .await
                .map_err(|e| QueueError::DatabaseError(e.to_string()))?
        };

        let queue = Self { pool };
        queue.migrate().await?;

        info!("Task queue database ready");
        Ok(queue)
    }

    /// In-memory queue for tests and local experimentation.
    pub async fn connect_in_memory() -> Result<Self, QueueError> {
        Self::connect(QueueConfig {
            database_path: ":memory:".into(),
            ..QueueConfig::default()
        })
        .await
    }

    async fn migrate(&self) -> Result<(), QueueError> {
        debug!("Running task queue schema migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                backend TEXT NOT NULL DEFAULT 'auto',
                options TEXT NOT NULL DEFAULT '{}',
                priority INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                worker_id TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                result_path TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tasks_dispatch ON tasks (status, priority DESC, created_at ASC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks (user_id)")
            .execute(&self.pool)
            .await?;

        debug!("Task queue schema migrations completed");
        Ok(())
    }

    fn now_iso8601() -> String {
        Utc::now().to_rfc3339()
    }

    /// Insert a fresh `pending` row and return the assigned task id.
    pub async fn create(&self, task: NewTask) -> Result<String, QueueError> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let now = Self::now_iso8601();
        let options_json = serde_json::to_string(&task.options)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, user_id, file_name, file_path, backend,
                               options, priority, status, retry_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?)
            "#,
        )
        .bind(&task_id)
        .bind(&task.user_id)
        .bind(&task.file_name)
        .bind(&task.file_path)
        .bind(&task.backend)
        .bind(&options_json)
        .bind(task.priority)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(task_id = %task_id, file_name = %task.file_name, "Task created");
        Ok(task_id)
    }

    /// Atomically claim the highest-priority pending task for `worker_id`.
    ///
    /// Ties within a priority class break by oldest `created_at` (FIFO). The
    /// claim is a single conditional `UPDATE ... RETURNING`, so no two
    /// concurrent callers can ever receive the same task.
    pub async fn lease_next(&self, worker_id: &str) -> Result<Option<TaskRecord>, QueueError> {
        let now = Self::now_iso8601();

        let row = sqlx::query(&format!(
            r#"
            UPDATE tasks
            SET status = 'processing', worker_id = ?, started_at = ?
            WHERE task_id = (
                SELECT task_id FROM tasks
                WHERE status = 'pending'
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
            )
              AND status = 'pending'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(worker_id)
        .bind(&now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let task = row_to_task_record(row)?;
                debug!(task_id = %task.task_id, worker_id = %worker_id, "Task leased");
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// Transition a `processing` task to `completed` or `failed`.
    ///
    /// Returns `true` iff the update applied. The update is rejected (no
    /// mutation, `false`) when the row's current `worker_id` differs from the
    /// caller's, protecting against a stale worker overwriting work that was
    /// re-leased elsewhere after stale recovery.
    pub async fn complete(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        result_path: Option<&str>,
        error_message: Option<&str>,
        worker_id: &str,
    ) -> Result<bool, QueueError> {
        if !matches!(new_status, TaskStatus::Completed | TaskStatus::Failed) {
            return Err(QueueError::InvalidTransition {
                current: TaskStatus::Processing,
                requested: new_status,
            });
        }

        let now = Self::now_iso8601();
        let rows_affected = sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?, result_path = ?, error_message = ?, completed_at = ?
            WHERE task_id = ? AND status = 'processing' AND worker_id = ?
            "#,
        )
        .bind(new_status.as_str())
        .bind(result_path)
        .bind(error_message)
        .bind(&now)
        .bind(task_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            warn!(
                task_id = %task_id,
                worker_id = %worker_id,
                "Completion rejected: task not processing or leased by another worker"
            );
        }
        Ok(rows_affected > 0)
    }

    /// Transition a `pending` task to `cancelled`. Rejects from any other state.
    pub async fn cancel(&self, task_id: &str) -> Result<bool, QueueError> {
        let now = Self::now_iso8601();
        let rows_affected = sqlx::query(
            "UPDATE tasks SET status = 'cancelled', completed_at = ? \
             WHERE task_id = ? AND status = 'pending'",
        )
        .bind(&now)
        .bind(task_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Get a task by id. Returns `None` if not found.
    pub async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, QueueError> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_task_record(row)?)),
            None => Ok(None),
        }
    }

    /// List tasks matching `filter`, newest first, up to `limit` rows.
    pub async fn list(
        &self,
        filter: &TaskFilter,
        limit: i64,
    ) -> Result<Vec<TaskRecord>, QueueError> {
        let rows = match (&filter.status, &filter.user_id) {
            (Some(status), Some(user_id)) => {
                sqlx::query(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ? AND user_id = ? \
                     ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(status.as_str())
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(status), None) => {
                sqlx::query(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ? \
                     ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some(user_id)) => {
                sqlx::query(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ? \
                     ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(row_to_task_record).collect()
    }

    /// Per-status row counts.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status_str: String = row.get("status");
            let count: i64 = row.get("n");
            match status_str.parse::<TaskStatus>()? {
                TaskStatus::Pending => stats.pending = count,
                TaskStatus::Processing => stats.processing = count,
                TaskStatus::Completed => stats.completed = count,
                TaskStatus::Failed => stats.failed = count,
                TaskStatus::Cancelled => stats.cancelled = count,
            }
        }
        Ok(stats)
    }

    /// Return all `processing` tasks whose lease started before `now - timeout`
    /// to `pending`, bumping `retry_count` and clearing `started_at`.
    ///
    /// This is the sole recovery mechanism for crashed or hung workers; it is
    /// only invoked explicitly (admin endpoint or operator cron).
    pub async fn reset_stale(&self, timeout: Duration) -> Result<u64, QueueError> {
        let now = Self::now_iso8601();
        let timeout_secs = timeout.as_secs_f64();

        let reset = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', retry_count = retry_count + 1, started_at = NULL
            WHERE status = 'processing'
              AND started_at IS NOT NULL
              AND (julianday(?) - julianday(started_at)) * 86400.0 > ?
            "#,
        )
        .bind(&now)
        .bind(timeout_secs)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if reset > 0 {
            info!("Reset {} stale task(s) back to pending", reset);
        }
        Ok(reset)
    }

    /// Delete terminal-state tasks whose `completed_at` is older than `age`.
    ///
    /// Returns the removed rows so the caller can sweep the matching result
    /// directories; the two retention policies share one window.
    pub async fn cleanup_old(&self, age: Duration) -> Result<Vec<RemovedTask>, QueueError> {
        let now = Self::now_iso8601();
        let age_secs = age.as_secs_f64();

        let rows = sqlx::query(
            r#"
            SELECT task_id, result_path FROM tasks
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND completed_at IS NOT NULL
              AND (julianday(?) - julianday(completed_at)) * 86400.0 > ?
            "#,
        )
        .bind(&now)
        .bind(age_secs)
        .fetch_all(&self.pool)
        .await?;

        let removed: Vec<RemovedTask> = rows
            .into_iter()
            .map(|row| RemovedTask {
                task_id: row.get("task_id"),
                result_path: row.get("result_path"),
            })
            .collect();

        if !removed.is_empty() {
            sqlx::query(
                r#"
                DELETE FROM tasks
                WHERE status IN ('completed', 'failed', 'cancelled')
                  AND completed_at IS NOT NULL
                  AND (julianday(?) - julianday(completed_at)) * 86400.0 > ?
                "#,
            )
            .bind(&now)
            .bind(age_secs)
            .execute(&self.pool)
            .await?;

            info!("Cleaned up {} old task(s)", removed.len());
        }

        Ok(removed)
    }

    /// Validate a transition for callers that mutate rows outside the guarded
    /// operations above (currently only used by tests and future tooling).
    pub fn check_transition(from: TaskStatus, to: TaskStatus) -> Result<(), QueueError> {
        state_machine::validate_transition(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn memory_queue() -> TaskQueue {
        TaskQueue::connect_in_memory().await.unwrap()
    }

    fn make_task(file_name: &str, priority: i64, user_id: &str) -> NewTask {
        NewTask {
            file_name: file_name.to_string(),
            file_path: format!("/tmp/uploads/{}", file_name),
            backend: "auto".to_string(),
            options: json!({"lang": "auto"}),
            priority,
            user_id: user_id.to_string(),
        }
    }

    /// Backdate a timestamp column directly; the public API always stamps `now`.
    async fn backdate(queue: &TaskQueue, task_id: &str, column: &str, value: &str) {
        sqlx::query(&format!("UPDATE tasks SET {} = ? WHERE task_id = ?", column))
            .bind(value)
            .bind(task_id)
            .execute(&queue.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let queue = memory_queue().await;

        let task_id = queue
            .create(make_task("report.pdf", 3, "user-1"))
            .await
            .unwrap();

        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.task_id, task_id);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.file_name, "report.pdf");
        assert_eq!(task.backend, "auto");
        assert_eq!(task.priority, 3);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.user_id, "user-1");
        assert_eq!(task.options["lang"], "auto");
        assert!(task.worker_id.is_none());
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());

        assert!(queue.get("no-such-task").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lease_respects_priority_then_fifo() {
        let queue = memory_queue().await;

        let low = queue.create(make_task("low.pdf", 0, "u")).await.unwrap();
        let high = queue.create(make_task("high.pdf", 10, "u")).await.unwrap();
        let mid_a = queue.create(make_task("mid-a.pdf", 5, "u")).await.unwrap();
        let mid_b = queue.create(make_task("mid-b.pdf", 5, "u")).await.unwrap();

        // Force a deterministic FIFO order within the priority-5 class.
        backdate(&queue, &mid_a, "created_at", "2025-01-01T00:00:01+00:00").await;
        backdate(&queue, &mid_b, "created_at", "2025-01-01T00:00:02+00:00").await;

        let order: Vec<String> = [
            queue.lease_next("w").await.unwrap().unwrap().task_id,
            queue.lease_next("w").await.unwrap().unwrap().task_id,
            queue.lease_next("w").await.unwrap().unwrap().task_id,
            queue.lease_next("w").await.unwrap().unwrap().task_id,
        ]
        .to_vec();

        assert_eq!(order, vec![high, mid_a, mid_b, low]);
        assert!(queue.lease_next("w").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lease_stamps_worker_and_started_at() {
        let queue = memory_queue().await;
        queue.create(make_task("a.pdf", 0, "u")).await.unwrap();

        let task = queue.lease_next("worker-7").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.worker_id.as_deref(), Some("worker-7"));
        assert!(task.started_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_lease_uniqueness() {
        let queue = Arc::new(memory_queue().await);

        const TASKS: usize = 40;
        for i in 0..TASKS {
            queue
                .create(make_task(&format!("doc-{}.pdf", i), (i % 4) as i64, "u"))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for w in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let worker_id = format!("worker-{}", w);
                let mut leased = Vec::new();
                while let Some(task) = queue.lease_next(&worker_id).await.unwrap() {
                    leased.push(task.task_id);
                }
                leased
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        let unique: HashSet<&String> = all.iter().collect();
        assert_eq!(all.len(), TASKS, "every task leased exactly once");
        assert_eq!(unique.len(), TASKS, "no task leased twice");
    }

    #[tokio::test]
    async fn test_complete_success_and_failure_paths() {
        let queue = memory_queue().await;
        let task_id = queue.create(make_task("a.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w1").await.unwrap().unwrap();

        let applied = queue
            .complete(
                &task_id,
                TaskStatus::Completed,
                Some("/out/abc"),
                None,
                "w1",
            )
            .await
            .unwrap();
        assert!(applied);

        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result_path.as_deref(), Some("/out/abc"));
        assert!(task.completed_at.is_some());

        // Failure path on a second task
        let task_id = queue.create(make_task("b.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w1").await.unwrap().unwrap();
        let applied = queue
            .complete(&task_id, TaskStatus::Failed, None, Some("engine blew up"), "w1")
            .await
            .unwrap();
        assert!(applied);
        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("engine blew up"));
    }

    #[tokio::test]
    async fn test_complete_rejects_worker_mismatch() {
        let queue = memory_queue().await;
        let task_id = queue.create(make_task("a.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w1").await.unwrap().unwrap();

        // A stale worker must not overwrite the active lease.
        let applied = queue
            .complete(&task_id, TaskStatus::Completed, Some("/out/x"), None, "w2")
            .await
            .unwrap();
        assert!(!applied);

        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.worker_id.as_deref(), Some("w1"));
        assert!(task.result_path.is_none());
    }

    #[tokio::test]
    async fn test_complete_rejects_non_terminal_target() {
        let queue = memory_queue().await;
        let task_id = queue.create(make_task("a.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w1").await.unwrap().unwrap();

        let err = queue
            .complete(&task_id, TaskStatus::Pending, None, None, "w1")
            .await
            .unwrap_err();
        match err {
            QueueError::InvalidTransition { requested, .. } => {
                assert_eq!(requested, TaskStatus::Pending)
            }
            other => panic!("Expected InvalidTransition, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_rejects_pending_task() {
        let queue = memory_queue().await;
        let task_id = queue.create(make_task("a.pdf", 0, "u")).await.unwrap();

        let applied = queue
            .complete(&task_id, TaskStatus::Completed, None, None, "w1")
            .await
            .unwrap();
        assert!(!applied);
        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_only_pending() {
        let queue = memory_queue().await;

        let pending = queue.create(make_task("a.pdf", 0, "u")).await.unwrap();
        assert!(queue.cancel(&pending).await.unwrap());
        let task = queue.get(&pending).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.completed_at.is_some());

        // Cancelled tasks are invisible to lease_next.
        assert!(queue.lease_next("w").await.unwrap().is_none());

        // A processing task cannot be cancelled.
        let processing = queue.create(make_task("b.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w").await.unwrap().unwrap();
        assert!(!queue.cancel(&processing).await.unwrap());
        assert_eq!(
            queue.get(&processing).await.unwrap().unwrap().status,
            TaskStatus::Processing
        );

        // Cancelling twice is a no-op.
        assert!(!queue.cancel(&pending).await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_stale_recovers_timed_out_lease() {
        let queue = memory_queue().await;
        let stale = queue.create(make_task("stale.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w-dead").await.unwrap().unwrap();
        backdate(&queue, &stale, "started_at", "2020-01-01T00:00:00+00:00").await;

        // A fresh lease must not be reset.
        let fresh = queue.create(make_task("fresh.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w-alive").await.unwrap().unwrap();

        let reset = queue.reset_stale(Duration::from_secs(60)).await.unwrap();
        assert_eq!(reset, 1);

        let task = queue.get(&stale).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);
        assert!(task.started_at.is_none());

        assert_eq!(
            queue.get(&fresh).await.unwrap().unwrap().status,
            TaskStatus::Processing
        );

        // The recovered task is leasable again; the dead worker's late
        // completion is rejected once someone else holds the lease.
        let re_leased = queue.lease_next("w-alive").await.unwrap().unwrap();
        assert_eq!(re_leased.task_id, stale);
        assert_eq!(re_leased.retry_count, 1);
        let applied = queue
            .complete(&stale, TaskStatus::Completed, Some("/out/old"), None, "w-dead")
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_cleanup_old_removes_exactly_expired_terminal_rows() {
        let queue = memory_queue().await;

        // Old completed task: removed.
        let old_done = queue.create(make_task("old.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w").await.unwrap().unwrap();
        queue
            .complete(&old_done, TaskStatus::Completed, Some("/out/old"), None, "w")
            .await
            .unwrap();
        backdate(&queue, &old_done, "completed_at", "2020-01-01T00:00:00+00:00").await;

        // Old cancelled task: removed.
        let old_cancelled = queue.create(make_task("c.pdf", 0, "u")).await.unwrap();
        queue.cancel(&old_cancelled).await.unwrap();
        backdate(&queue, &old_cancelled, "completed_at", "2020-01-01T00:00:00+00:00").await;

        // Recent completed task: kept.
        let recent = queue.create(make_task("r.pdf", 0, "u")).await.unwrap();
        queue.lease_next("w").await.unwrap().unwrap();
        queue
            .complete(&recent, TaskStatus::Completed, Some("/out/r"), None, "w")
            .await
            .unwrap();

        // Old pending task: not terminal, kept.
        let pending = queue.create(make_task("p.pdf", 0, "u")).await.unwrap();
        backdate(&queue, &pending, "created_at", "2020-01-01T00:00:00+00:00").await;

        let removed = queue
            .cleanup_old(Duration::from_secs(7 * 24 * 3600))
            .await
            .unwrap();

        let removed_ids: HashSet<String> =
            removed.iter().map(|r| r.task_id.clone()).collect();
        assert_eq!(removed_ids.len(), 2);
        assert!(removed_ids.contains(&old_done));
        assert!(removed_ids.contains(&old_cancelled));
        assert!(
            removed
                .iter()
                .find(|r| r.task_id == old_done)
                .unwrap()
                .result_path
                .is_some()
        );

        assert!(queue.get(&old_done).await.unwrap().is_none());
        assert!(queue.get(&old_cancelled).await.unwrap().is_none());
        assert!(queue.get(&recent).await.unwrap().is_some());
        assert!(queue.get(&pending).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let queue = memory_queue().await;
        queue.create(make_task("a.pdf", 0, "alice")).await.unwrap();
        queue.create(make_task("b.pdf", 0, "alice")).await.unwrap();
        queue.create(make_task("c.pdf", 0, "bob")).await.unwrap();
        let leased = queue.lease_next("w").await.unwrap().unwrap();

        let all = queue.list(&TaskFilter::default(), 100).await.unwrap();
        assert_eq!(all.len(), 3);

        let alice_only = queue
            .list(
                &TaskFilter {
                    user_id: Some("alice".into()),
                    ..TaskFilter::default()
                },
                100,
            )
            .await
            .unwrap();
        assert_eq!(alice_only.len(), 2);
        assert!(alice_only.iter().all(|t| t.user_id == "alice"));

        let processing = queue
            .list(
                &TaskFilter {
                    status: Some(TaskStatus::Processing),
                    ..TaskFilter::default()
                },
                100,
            )
            .await
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].task_id, leased.task_id);

        let limited = queue.list(&TaskFilter::default(), 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_stats_buckets() {
        let queue = memory_queue().await;
        queue.create(make_task("a.pdf", 0, "u")).await.unwrap();
        queue.create(make_task("b.pdf", 0, "u")).await.unwrap();
        let cancelled = queue.create(make_task("c.pdf", 0, "u")).await.unwrap();
        queue.cancel(&cancelled).await.unwrap();
        let leased = queue.lease_next("w").await.unwrap().unwrap();
        queue
            .complete(&leased.task_id, TaskStatus::Failed, None, Some("boom"), "w")
            .await
            .unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total(), 3);
    }
}
