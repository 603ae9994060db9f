//! Admission control, concurrency limiting, retry and request batching for
//! calls to a downstream generation service.

pub mod batcher;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod queue;
pub mod retry;
pub mod stats;

pub use batcher::{BatchClient, BatchFailure, BatchOutcome, BatchReply, BatchResponse, Batcher, BatcherConfig};
pub use dispatcher::{Dispatcher, DispatcherConfig, TaskFailure, TaskHandle, TaskOptions, TaskOutcome};
pub use queue::{AdmissionError, TaskId};
pub use retry::TaskError;
pub use stats::{BatcherStats, DispatcherStats};
