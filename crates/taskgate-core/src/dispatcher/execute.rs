//! Running one work item: pacing, the retry loop, and slot release.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::queue::TaskId;
use crate::retry::run_with_retry;

use super::item::WorkItem;
use super::outcome::{TaskFailure, TaskOutcome};
use super::Inner;

/// Releases the item's concurrency slot when dropped, including when the task
/// body panics, and triggers the next dispatch pass.
struct SlotGuard<'a, T: Send + 'static> {
    inner: &'a Arc<Inner<T>>,
    id: TaskId,
    /// `Some(success)` once an outcome has been produced.
    finished: Option<bool>,
}

impl<T: Send + 'static> Drop for SlotGuard<'_, T> {
    fn drop(&mut self) {
        if self.finished.is_none() {
            error!(task_id = self.id, "task ended without an outcome");
        }
        self.inner.release_slot(self.finished.unwrap_or(false));
    }
}

pub(super) async fn run_item<T: Send + 'static>(inner: Arc<Inner<T>>, item: WorkItem<T>) {
    let mut guard = SlotGuard {
        inner: &inner,
        id: item.id,
        finished: None,
    };
    let WorkItem {
        id,
        mut task,
        options,
        created_at,
        tx,
        ..
    } = item;

    inner.pace().await;

    let policy = inner.retry_policy(options.max_retries);
    let key = options.batch_key.as_deref().unwrap_or("-");
    debug!(
        task_id = id,
        priority = options.priority,
        key,
        waited_ms = created_at.elapsed().as_millis() as u64,
        "task started"
    );

    let started = Instant::now();
    let run = run_with_retry(
        &policy,
        &inner.classifier,
        || task(),
        |attempt, err, delay| {
            inner.record_retry();
            info!(
                task_id = id,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "task failed, scheduling retry with backoff"
            );
        },
    )
    .await;
    let duration = started.elapsed();

    let outcome = match run.result {
        Ok(value) => {
            debug!(task_id = id, attempts = run.attempts, "task completed");
            TaskOutcome {
                id,
                attempts: run.attempts,
                duration,
                result: Ok(value),
            }
        }
        Err(stop) => {
            warn!(task_id = id, attempts = run.attempts, error = %stop.error(), "task failed");
            let failure = TaskFailure::from_stop(stop, run.attempts);
            TaskOutcome::failed(id, run.attempts, duration, failure)
        }
    };

    // Deliver before releasing the slot so `idle()` never resolves ahead of
    // the last outcome.
    guard.finished = Some(outcome.is_success());
    let _ = tx.send(outcome);
    drop(guard);
}
