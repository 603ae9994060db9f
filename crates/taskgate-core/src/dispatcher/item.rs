//! Work items: the boxed task plus its per-submission options.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::queue::TaskId;
use crate::retry::TaskError;

use super::outcome::TaskOutcome;

/// Future returned by one invocation of a task.
pub type TaskFuture<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send>>;

/// Zero-argument operation, invoked once per attempt.
pub(crate) type BoxedTask<T> = Box<dyn FnMut() -> TaskFuture<T> + Send>;

/// Per-submission options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOptions {
    /// Higher runs first. Default 0.
    pub priority: i32,
    /// Overrides the dispatcher's default retry budget.
    pub max_retries: Option<u32>,
    /// Grouping key, carried into log fields.
    pub batch_key: Option<String>,
}

impl TaskOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_batch_key(mut self, key: impl Into<String>) -> Self {
        self.batch_key = Some(key.into());
        self
    }
}

/// A submission owned by the dispatcher until it resolves or is evicted.
pub(crate) struct WorkItem<T> {
    pub(crate) id: TaskId,
    pub(crate) task: BoxedTask<T>,
    pub(crate) options: TaskOptions,
    pub(crate) created_at: Instant,
    pub(crate) tx: oneshot::Sender<TaskOutcome<T>>,
    /// Wait-timeout timer; aborted when the item starts or is cleared.
    pub(crate) timer: Option<AbortHandle>,
}

impl<T> WorkItem<T> {
    pub(crate) fn new<F, Fut>(id: TaskId, mut task: F, options: TaskOptions) -> (Self, oneshot::Receiver<TaskOutcome<T>>)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let item = Self {
            id,
            task: Box::new(move || Box::pin(task()) as TaskFuture<T>),
            options,
            created_at: Instant::now(),
            tx,
            timer: None,
        };
        (item, rx)
    }

    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
