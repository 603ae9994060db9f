use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batching thresholds (`[batcher]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Flush as soon as a batch holds this many requests.
    pub batch_size: usize,
    /// Flush when no request arrived for this long (milliseconds).
    pub batch_delay_ms: u64,
    /// Flush when the batch is this old, regardless of arrivals (milliseconds).
    pub max_batch_delay_ms: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 100,
            max_batch_delay_ms: 1000,
        }
    }
}

impl BatcherConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn max_batch_delay(&self) -> Duration {
        Duration::from_millis(self.max_batch_delay_ms)
    }
}
