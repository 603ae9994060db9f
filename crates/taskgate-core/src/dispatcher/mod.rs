//! Admission and execution engine.
//!
//! Accepts work items into a bounded priority queue, starts them while fewer
//! than `max_concurrent` are running, paces task starts, drives the retry loop
//! and delivers a structured outcome to each submitter.
//!
//! All queue, counter and pacing state lives behind one mutex that is never
//! held across an await point. A dispatch pass runs after every submission,
//! completion, eviction and `resume()`.

mod config;
mod execute;
mod item;
mod outcome;

pub use config::DispatcherConfig;
pub use item::{TaskFuture, TaskOptions};
pub use outcome::{TaskFailure, TaskHandle, TaskOutcome};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::queue::{AdmissionError, BoundedQueue, TaskId};
use crate::retry::{BackoffPolicy, ErrorClassifier, RetryPolicy, TaskError};
use crate::stats::DispatcherStats;

use item::WorkItem;

struct State<T> {
    queue: BoundedQueue<WorkItem<T>>,
    running: usize,
    paused: bool,
    /// Start time reserved by the most recent starter (pacing).
    last_start: Option<Instant>,
    counters: DispatcherStats,
}

pub(crate) struct Inner<T> {
    config: DispatcherConfig,
    backoff: BackoffPolicy,
    classifier: ErrorClassifier,
    state: Mutex<State<T>>,
    next_id: AtomicU64,
    idle: Notify,
}

/// Concurrency-limited task dispatcher. Clones share the same queue and slots.
///
/// Must be used from within a Tokio runtime: submission arms a timer task and
/// dispatch spawns task bodies.
pub struct Dispatcher<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Dispatcher with default backoff shape (base = `retry_delay_ms`) and the
    /// built-in error vocabulary.
    pub fn new(config: DispatcherConfig) -> Self {
        let backoff = BackoffPolicy {
            base_delay: config.retry_delay(),
            ..BackoffPolicy::default()
        };
        Self::with_retry(config, backoff, ErrorClassifier::new())
    }

    pub fn with_retry(
        config: DispatcherConfig,
        backoff: BackoffPolicy,
        classifier: ErrorClassifier,
    ) -> Self {
        let config = DispatcherConfig {
            max_concurrent: config.max_concurrent.max(1),
            ..config
        };
        let mut counters = DispatcherStats::default();
        counters.max_concurrent = config.max_concurrent;
        let state = State {
            queue: BoundedQueue::new(config.max_queue_size),
            running: 0,
            paused: false,
            last_start: None,
            counters,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                backoff,
                classifier,
                state: Mutex::new(state),
                next_id: AtomicU64::new(1),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Admit a task. Fails immediately with `QueueFull` when the queue is at
    /// its limit; otherwise the returned handle resolves to the outcome.
    pub fn submit<F, Fut>(&self, task: F, options: TaskOptions) -> Result<TaskHandle<T>, AdmissionError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let priority = options.priority;
        let (mut item, rx) = WorkItem::new(id, task, options);

        {
            let mut state = self.inner.lock();
            let size = state.queue.len();
            let limit = state.queue.limit();
            if size >= limit {
                state.counters.rejected += 1;
                drop(state);
                warn!(task_id = id, size, limit, "submission rejected, queue full");
                return Err(AdmissionError::QueueFull { size, limit });
            }
            item.timer = self.arm_wait_timer(id);
            state.queue.push(id, priority, item)?;
            state.counters.enqueued += 1;
            debug!(task_id = id, priority, queued = state.queue.len(), "task enqueued");
        }

        self.inner.pump();
        Ok(TaskHandle::new(id, rx))
    }

    /// Submit and wait for the outcome.
    pub async fn enqueue<F, Fut>(&self, task: F, options: TaskOptions) -> Result<TaskOutcome<T>, AdmissionError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Ok(self.submit(task, options)?.await)
    }

    /// Stop starting queued items. Running items finish normally.
    pub fn pause(&self) {
        self.inner.lock().paused = true;
        debug!("dispatcher paused");
    }

    pub fn resume(&self) {
        self.inner.lock().paused = false;
        debug!("dispatcher resumed");
        self.inner.pump();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Fail every queued (not running) item with `QueueCleared`.
    /// Returns how many items were cleared.
    pub fn clear(&self) -> usize {
        let drained = {
            let mut state = self.inner.lock();
            let drained = state.queue.drain();
            let n = drained.len() as u64;
            state.counters.cleared += n;
            state.counters.failed += n;
            drained
        };
        let count = drained.len();
        for (id, mut item) in drained {
            item.cancel_timer();
            let waited = item.created_at.elapsed();
            let _ = item
                .tx
                .send(TaskOutcome::failed(id, 0, waited, TaskFailure::QueueCleared));
        }
        if count > 0 {
            warn!(count, "queue cleared");
        }
        self.inner.notify_if_idle();
        count
    }

    pub fn stats(&self) -> DispatcherStats {
        let state = self.inner.lock();
        let mut stats = state.counters.clone();
        stats.running = state.running;
        stats.queued = state.queue.len();
        stats.paused = state.paused;
        stats
    }

    /// Pending ids in dispatch order.
    pub fn queued_ids(&self) -> Vec<TaskId> {
        self.inner.lock().queue.ids()
    }

    /// Resolves once nothing is queued or running. Never resolves while paused
    /// with items still queued.
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn arm_wait_timer(&self, id: TaskId) -> Option<tokio::task::AbortHandle> {
        let timeout = self.inner.config.queue_timeout()?;
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.evict(id);
            }
        });
        Some(handle.abort_handle())
    }
}

impl<T> State<T> {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.running == 0
    }
}

impl<T: Send + 'static> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatch pass: start queued items until the queue is empty, capacity is
    /// exhausted, or the dispatcher is paused.
    fn pump(self: &Arc<Self>) {
        let ready = {
            let mut state = self.lock();
            let mut ready = Vec::new();
            while !state.paused && state.running < self.config.max_concurrent {
                let Some((_, mut item)) = state.queue.pop_front() else {
                    break;
                };
                item.cancel_timer();
                state.running += 1;
                state.counters.started += 1;
                ready.push(item);
            }
            ready
        };
        for item in ready {
            tokio::spawn(execute::run_item(Arc::clone(self), item));
        }
    }

    /// Wait-timeout fired: fail the item if it is still queued.
    fn evict(self: &Arc<Self>, id: TaskId) {
        let item = {
            let mut state = self.lock();
            let Some(item) = state.queue.remove(id) else {
                return;
            };
            state.counters.timed_out += 1;
            state.counters.failed += 1;
            item
        };
        let waited = item.created_at.elapsed();
        warn!(task_id = id, waited_ms = waited.as_millis() as u64, "task evicted from queue");
        let _ = item
            .tx
            .send(TaskOutcome::failed(id, 0, waited, TaskFailure::QueueTimeout { waited }));
        self.pump();
        self.notify_if_idle();
    }

    fn release_slot(self: &Arc<Self>, success: bool) {
        {
            let mut state = self.lock();
            state.running = state.running.saturating_sub(1);
            if success {
                state.counters.completed += 1;
            } else {
                state.counters.failed += 1;
            }
        }
        self.pump();
        self.notify_if_idle();
    }

    fn record_retry(&self) {
        self.lock().counters.retried += 1;
    }

    fn retry_policy(&self, max_retries: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            max_retries: max_retries.unwrap_or(self.config.max_retries),
            backoff: self.backoff,
        }
    }

    /// Reserve the next start slot `interval` after the previous one and wait
    /// for it. No-op when pacing is disabled.
    async fn pace(&self) {
        let interval = self.config.interval();
        if interval.is_zero() {
            return;
        }
        let start_at = {
            let mut state = self.lock();
            let now = Instant::now();
            let at = match state.last_start {
                Some(last) => (last + interval).max(now),
                None => now,
            };
            state.last_start = Some(at);
            at
        };
        tokio::time::sleep_until(start_at).await;
    }

    fn notify_if_idle(&self) {
        if self.lock().is_idle() {
            self.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(max_concurrent: usize, max_queue_size: usize) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent,
            max_queue_size,
            retry_delay_ms: 10,
            ..DispatcherConfig::default()
        }
    }

    #[tokio::test]
    async fn runs_a_task_and_reports_success() {
        let d: Dispatcher<u32> = Dispatcher::new(config(2, 10));
        let outcome = d
            .enqueue(|| async { Ok(7) }, TaskOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result, Ok(7));
        let stats = d.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.started, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.running, 0);
    }

    #[tokio::test]
    async fn queue_full_is_rejected_synchronously() {
        let d: Dispatcher<()> = Dispatcher::new(config(1, 2));
        d.pause();
        let _a = d.submit(|| async { Ok(()) }, TaskOptions::default()).unwrap();
        let _b = d.submit(|| async { Ok(()) }, TaskOptions::default()).unwrap();
        let err = d
            .submit(|| async { Ok(()) }, TaskOptions::default())
            .unwrap_err();
        assert_eq!(err, AdmissionError::QueueFull { size: 2, limit: 2 });
        let stats = d.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.enqueued, 2);
    }

    #[tokio::test]
    async fn paused_dispatcher_keeps_items_queued_until_resume() {
        let d: Dispatcher<()> = Dispatcher::new(config(1, 10));
        d.pause();
        assert!(d.is_paused());
        let handle = d.submit(|| async { Ok(()) }, TaskOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(d.stats().started, 0);
        d.resume();
        assert!(handle.await.is_success());
        d.idle().await;
        assert_eq!(d.stats().completed, 1);
    }

    #[tokio::test]
    async fn panicking_task_releases_its_slot() {
        let d: Dispatcher<()> = Dispatcher::new(config(1, 10));
        async fn explode() -> Result<(), TaskError> {
            panic!("task body blew up")
        }
        let boom = d.submit(explode, TaskOptions::default()).unwrap();
        let next = d.submit(|| async { Ok(()) }, TaskOptions::default()).unwrap();
        assert_eq!(boom.await.result, Err(TaskFailure::Dropped));
        assert!(next.await.is_success());
        let stats = d.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.running, 0);
    }
}
