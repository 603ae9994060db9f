use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dispatcher limits (`[dispatcher]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum task bodies executing at once.
    pub max_concurrent: usize,
    /// Maximum items waiting for a slot; submissions beyond are rejected.
    pub max_queue_size: usize,
    /// Minimum spacing between task starts in milliseconds (0 = disabled).
    pub interval_ms: u64,
    /// Base backoff delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Default retry budget per item (attempts = max_retries + 1).
    pub max_retries: u32,
    /// Maximum time an item may wait in the queue in milliseconds (0 = no limit).
    pub queue_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_queue_size: 100,
            interval_ms: 0,
            retry_delay_ms: 1000,
            max_retries: 3,
            queue_timeout_ms: 90_000,
        }
    }
}

impl DispatcherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn queue_timeout(&self) -> Option<Duration> {
        (self.queue_timeout_ms > 0).then(|| Duration::from_millis(self.queue_timeout_ms))
    }
}
