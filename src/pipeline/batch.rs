//! Concurrent batch runs.
//!
//! Each task runs on a blocking worker thread with its own pipeline, so no
//! simulator or sensor is ever shared between tasks. A semaphore caps how many
//! run at once.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::summary::{BatchSummary, TaskOutcome, TaskSummary};

/// Run `run(task)` for every task, at most `jobs` at a time.
///
/// `run` is expected to build, use and drop a whole pipeline. Outcomes are
/// returned in the order of `tasks`; a task that errors or panics is recorded
/// as [`TaskOutcome::Failed`] and the others carry on.
pub async fn run_tasks_concurrently<F>(tasks: Vec<String>, jobs: usize, run: F) -> BatchSummary
where
    F: Fn(&str) -> Result<TaskSummary> + Send + Sync + 'static,
{
    let jobs = jobs.max(1);
    info!(tasks = tasks.len(), jobs, "Starting batch");

    let run = Arc::new(run);
    let permits = Arc::new(Semaphore::new(jobs));
    let mut handles = Vec::with_capacity(tasks.len());

    for task in tasks {
        let run = Arc::clone(&run);
        let permits = Arc::clone(&permits);
        let task_name = task.clone();
        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            tokio::task::spawn_blocking(move || run(&task)).await
        });
        handles.push((task_name, handle));
    }

    let mut batch = BatchSummary::default();
    for (task_name, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(Ok(summary))) => TaskOutcome::Completed(summary),
            Ok(Ok(Err(err))) => {
                let reason = format!("{err:#}");
                error!(task = %task_name, error = %reason, "Task failed");
                TaskOutcome::Failed { task_name, reason }
            }
            Ok(Err(join_err)) | Err(join_err) => {
                let reason = format!("worker did not finish: {join_err}");
                error!(task = %task_name, error = %reason, "Task failed");
                TaskOutcome::Failed { task_name, reason }
            }
        };
        batch.outcomes.push(outcome);
    }

    info!(
        saved = batch.episodes_saved(),
        failed_episodes = batch.episodes_failed(),
        failed_tasks = batch.failed_tasks().len(),
        "Batch complete"
    );
    batch
}
