//! Counter snapshots for the dispatcher and batcher.
//!
//! Counters are mutated only inside the owning component's critical section;
//! callers receive these plain copies and derive rates from them.

use serde::Serialize;

/// Snapshot of dispatcher counters and gauges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Submissions accepted into the queue.
    pub enqueued: u64,
    /// Submissions rejected because the queue was full.
    pub rejected: u64,
    /// Items moved from queued to running.
    pub started: u64,
    /// Items that finished successfully.
    pub completed: u64,
    /// Items that received a failure outcome (evictions included).
    pub failed: u64,
    /// Retry attempts scheduled across all items.
    pub retried: u64,
    /// Items evicted by their wait-timeout.
    pub timed_out: u64,
    /// Items failed by `clear()`.
    pub cleared: u64,
    /// Items currently executing.
    pub running: usize,
    /// Items currently waiting.
    pub queued: usize,
    pub max_concurrent: usize,
    pub paused: bool,
}

impl DispatcherStats {
    /// Fraction of concurrency slots in use, in [0.0, 1.0].
    pub fn utilization(&self) -> f64 {
        if self.max_concurrent == 0 {
            return 0.0;
        }
        self.running as f64 / self.max_concurrent as f64
    }
}

/// Snapshot of batcher counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatcherStats {
    pub batches_created: u64,
    /// Requests added to any batch.
    pub requests_batched: u64,
    /// Batches flushed to the client.
    pub batches_processed: u64,
    /// Flushed batches whose client call failed.
    pub failed_batches: u64,
    pub active_batches: usize,
    /// Requests waiting in active batches.
    pub pending_requests: usize,
}

impl BatcherStats {
    /// Average requests per processed batch (0 before the first flush).
    pub fn efficiency(&self) -> f64 {
        if self.batches_processed == 0 {
            return 0.0;
        }
        self.requests_batched as f64 / self.batches_processed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_is_running_over_capacity() {
        let s = DispatcherStats {
            running: 2,
            max_concurrent: 4,
            ..Default::default()
        };
        assert!((s.utilization() - 0.5).abs() < 1e-9);
        assert_eq!(DispatcherStats::default().utilization(), 0.0);
    }

    #[test]
    fn efficiency_is_requests_per_batch() {
        let s = BatcherStats {
            requests_batched: 9,
            batches_processed: 3,
            ..Default::default()
        };
        assert!((s.efficiency() - 3.0).abs() < 1e-9);
        assert_eq!(BatcherStats::default().efficiency(), 0.0);
    }
}
