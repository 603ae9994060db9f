//! Pending batch state and per-member outcomes.

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::retry::TaskError;

use super::config::BatcherConfig;

/// Why a batch member did not get a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchFailure {
    #[error("batch request failed: {0}")]
    Client(TaskError),
    #[error("batch client panicked")]
    ClientPanicked,
    #[error("no reply for batch member {index}")]
    MissingReply { index: usize },
    #[error("batch dropped before flush")]
    Dropped,
}

/// Outcome delivered to each caller of `add_to_batch`.
#[derive(Debug, Clone)]
pub struct BatchOutcome<O> {
    pub key: String,
    /// Number of requests in the flushed batch (0 if it was never flushed).
    pub batch_size: usize,
    pub result: Result<O, BatchFailure>,
    pub metadata: Option<serde_json::Value>,
}

impl<O> BatchOutcome<O> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub(super) struct Member<P, O> {
    pub(super) payload: P,
    pub(super) tx: oneshot::Sender<BatchOutcome<O>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FlushReason {
    Size,
    Idle,
    Age,
    Drain,
}

impl FlushReason {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Idle => "idle",
            FlushReason::Age => "age",
            FlushReason::Drain => "drain",
        }
    }
}

/// Requests accumulated under one key. Flushed exactly once.
pub(super) struct Batch<P, O> {
    pub(super) id: u64,
    pub(super) key: String,
    pub(super) members: Vec<Member<P, O>>,
    pub(super) created_at: Instant,
    pub(super) last_arrival: Instant,
    /// Soft/hard timer task; aborted on size-triggered or drain flush.
    pub(super) timer: Option<AbortHandle>,
}

impl<P, O> Batch<P, O> {
    pub(super) fn new(id: u64, key: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            key,
            members: Vec::new(),
            created_at: now,
            last_arrival: now,
            timer: None,
        }
    }

    /// Earlier of the idle deadline and the age deadline.
    pub(super) fn deadline(&self, config: &BatcherConfig) -> (Instant, FlushReason) {
        let idle = self.last_arrival + config.batch_delay();
        let age = self.created_at + config.max_batch_delay();
        if idle <= age {
            (idle, FlushReason::Idle)
        } else {
            (age, FlushReason::Age)
        }
    }

    pub(super) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
