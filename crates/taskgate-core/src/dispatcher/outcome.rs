//! Structured outcomes delivered to submitters.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::queue::TaskId;
use crate::retry::{RetryStop, TaskError};

/// Why a submission did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    #[error("timed out after {waited:?} waiting in queue")]
    QueueTimeout { waited: Duration },
    #[error("queue cleared before the task started")]
    QueueCleared,
    #[error("fatal: {0}")]
    Fatal(TaskError),
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TaskError },
    #[error("{0}")]
    NonRetryable(TaskError),
    #[error("task dropped before reporting an outcome")]
    Dropped,
}

impl TaskFailure {
    pub(crate) fn from_stop(stop: RetryStop, attempts: u32) -> Self {
        match stop {
            RetryStop::Fatal(e) => TaskFailure::Fatal(e),
            RetryStop::Exhausted(last) => TaskFailure::RetriesExhausted { attempts, last },
            RetryStop::NotRetryable(e) => TaskFailure::NonRetryable(e),
        }
    }

    /// The task's own error, when the failure came from executing it.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            TaskFailure::Fatal(e)
            | TaskFailure::NonRetryable(e)
            | TaskFailure::RetriesExhausted { last: e, .. } => Some(e),
            TaskFailure::QueueTimeout { .. } | TaskFailure::QueueCleared | TaskFailure::Dropped => {
                None
            }
        }
    }
}

/// Final outcome of one submission.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub id: TaskId,
    /// Invocations made (0 if the item never started).
    pub attempts: u32,
    /// Execution time, or time spent waiting for items that never started.
    pub duration: Duration,
    pub result: Result<T, TaskFailure>,
}

impl<T> TaskOutcome<T> {
    pub(crate) fn failed(id: TaskId, attempts: u32, duration: Duration, failure: TaskFailure) -> Self {
        Self {
            id,
            attempts,
            duration,
            result: Err(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, TaskFailure> {
        self.result
    }
}

/// Resolves to the submission's outcome. Dropping it does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    rx: oneshot::Receiver<TaskOutcome<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, rx: oneshot::Receiver<TaskOutcome<T>>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskOutcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| TaskOutcome::failed(id, 0, Duration::ZERO, TaskFailure::Dropped))
        })
    }
}
