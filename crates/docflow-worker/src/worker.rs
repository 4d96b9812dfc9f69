//! A single poll-lease-execute loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use docflow_engine::dispatch;
use docflow_engine::{EngineError, EngineRegistry, choose_engine};
use docflow_queue::{TaskQueue, TaskRecord, TaskStatus};

pub struct Worker {
    id: String,
    queue: TaskQueue,
    engines: Arc<EngineRegistry>,
    output_root: PathBuf,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        id: String,
        queue: TaskQueue,
        engines: Arc<EngineRegistry>,
        output_root: PathBuf,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            queue,
            engines,
            output_root,
            poll_interval,
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Poll the queue until cancelled, executing one task at a time.
    ///
    /// A leased task always runs to completion: cancellation flips to
    /// draining, so the loop checks the token only between tasks.
    pub async fn run(self) {
        info!(worker_id = %self.id, "Worker started task polling loop");

        let mut idle = false;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.queue.lease_next(&self.id).await {
                Ok(Some(task)) => {
                    idle = false;
                    self.execute(task).await;
                }
                Ok(None) => {
                    if !idle {
                        debug!(worker_id = %self.id, "Worker idle, waiting for tasks");
                        idle = true;
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(err) => {
                    error!(worker_id = %self.id, error = %err, "Worker loop error");
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.id, "Worker stopped task polling loop");
    }

    /// Run one leased task through its engine and record the outcome.
    async fn execute(&self, task: TaskRecord) {
        let task_id = task.task_id.clone();
        info!(worker_id = %self.id, task_id = %task_id, file_name = %task.file_name, "Processing task");

        let completion = match self.process(&task).await {
            Ok(output_dir) => {
                self.queue
                    .complete(
                        &task_id,
                        TaskStatus::Completed,
                        Some(&output_dir.to_string_lossy()),
                        None,
                        &self.id,
                    )
                    .await
            }
            Err(err) => {
                let message = err.to_string();
                error!(worker_id = %self.id, task_id = %task_id, error = %message, "Task failed");
                self.queue
                    .complete(&task_id, TaskStatus::Failed, None, Some(&message), &self.id)
                    .await
            }
        };

        match completion {
            Ok(true) => {
                info!(worker_id = %self.id, task_id = %task_id, "Task finished");
                // The inbound payload is only consumed once; remove it now
                // that this worker owns the terminal state.
                Self::remove_if_present(&task.file_path).await;
            }
            Ok(false) => {
                // Stale-recovery race: the task was re-leased elsewhere while
                // we were working. The other lease produces the authoritative
                // result and owns the inbound file.
                warn!(
                    worker_id = %self.id,
                    task_id = %task_id,
                    "Completion rejected: task re-leased by another worker"
                );
            }
            Err(err) => {
                error!(worker_id = %self.id, task_id = %task_id, error = %err, "Failed to record task outcome");
            }
        }
    }

    /// Resolve the engine and run it; returns the result directory.
    async fn process(&self, task: &TaskRecord) -> Result<PathBuf, EngineError> {
        let extension = dispatch::file_extension(&task.file_name);
        let engine_name = choose_engine(&extension, &task.backend);
        let engine = self.engines.resolve(engine_name)?;

        let output_dir = self.output_root.join(&task.task_id);
        tokio::fs::create_dir_all(&output_dir).await?;

        debug!(
            worker_id = %self.id,
            task_id = %task.task_id,
            engine = %engine_name,
            output_dir = %output_dir.display(),
            "Dispatching to engine"
        );

        engine
            .parse(Path::new(&task.file_path), &output_dir, &task.options)
            .await?;
        Ok(output_dir)
    }

    async fn remove_if_present(path: &str) {
        let path = Path::new(path);
        if path.exists() {
            if let Err(err) = tokio::fs::remove_file(path).await {
                warn!(file = %path.display(), error = %err, "Failed to remove inbound file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_engine::{EngineRegistry, MarkdownConvertEngine};
    use docflow_queue::NewTask;
    use serde_json::json;

    fn test_registry() -> Arc<EngineRegistry> {
        let mut registry = EngineRegistry::new();
        registry.register(MarkdownConvertEngine::new());
        Arc::new(registry)
    }

    fn test_worker(
        id: &str,
        queue: TaskQueue,
        registry: Arc<EngineRegistry>,
        output_root: PathBuf,
    ) -> Worker {
        Worker::new(
            id.to_string(),
            queue,
            registry,
            output_root,
            Duration::from_millis(20),
            CancellationToken::new(),
        )
    }

    async fn submit_text_task(queue: &TaskQueue, dir: &Path, name: &str) -> String {
        let input = dir.join(format!("upload_{}", name));
        tokio::fs::write(&input, "some text\n").await.unwrap();
        queue
            .create(NewTask {
                file_name: name.to_string(),
                file_path: input.to_string_lossy().into_owned(),
                backend: "auto".to_string(),
                options: json!({}),
                priority: 0,
                user_id: "u".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_execute_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::connect_in_memory().await.unwrap();
        let task_id = submit_text_task(&queue, dir.path(), "notes.txt").await;

        let worker = test_worker("w1", queue.clone(), test_registry(), dir.path().join("out"));
        let task = queue.lease_next("w1").await.unwrap().unwrap();
        let input_path = task.file_path.clone();
        worker.execute(task).await;

        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let result_path = PathBuf::from(task.result_path.unwrap());
        assert!(result_path.join("notes.md").exists());
        assert!(
            !Path::new(&input_path).exists(),
            "inbound payload removed after completion"
        );
    }

    #[tokio::test]
    async fn test_execute_unavailable_engine_fails_task() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::connect_in_memory().await.unwrap();

        let input = dir.path().join("talk.wav");
        tokio::fs::write(&input, b"RIFF").await.unwrap();
        let task_id = queue
            .create(NewTask {
                file_name: "talk.wav".to_string(),
                file_path: input.to_string_lossy().into_owned(),
                backend: "sensevoice".to_string(),
                options: json!({}),
                priority: 0,
                user_id: "u".to_string(),
            })
            .await
            .unwrap();

        // Registry without any audio engine: dispatch resolves to an
        // unregistered name and the task fails fast.
        let worker = test_worker("w1", queue.clone(), test_registry(), dir.path().join("out"));
        let task = queue.lease_next("w1").await.unwrap().unwrap();
        worker.execute(task).await;

        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        let message = task.error_message.unwrap();
        assert!(message.contains("not available"), "got: {}", message);
        // The worker still consumed the payload for the failed task.
        assert!(!input.exists());
    }

    #[tokio::test]
    async fn test_stale_loser_keeps_hands_off() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::connect_in_memory().await.unwrap();
        let task_id = submit_text_task(&queue, dir.path(), "doc.txt").await;

        // w-stale leases, then the lease times out and is recovered. A zero
        // timeout makes any elapsed lease stale.
        let stale_lease = queue.lease_next("w-stale").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.reset_stale(Duration::ZERO).await.unwrap(), 1);

        // w-new re-leases the task.
        let re_leased = queue.lease_next("w-new").await.unwrap().unwrap();
        assert_eq!(re_leased.retry_count, 1);
        let input_path = stale_lease.file_path.clone();

        // The stale worker finishes late; its completion must be rejected and
        // it must leave the inbound file for the active lease.
        let worker = test_worker(
            "w-stale",
            queue.clone(),
            test_registry(),
            dir.path().join("out"),
        );
        worker.execute(stale_lease).await;

        let task = queue.get(&task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.worker_id.as_deref(), Some("w-new"));
        assert!(
            Path::new(&input_path).exists(),
            "loser must not delete the winner's inbound file"
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::connect_in_memory().await.unwrap();
        let cancel = CancellationToken::new();
        let worker = Worker::new(
            "w1".to_string(),
            queue,
            test_registry(),
            dir.path().to_path_buf(),
            Duration::from_millis(20),
            cancel.clone(),
        );

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker loop exits after cancellation")
            .unwrap();
    }
}
