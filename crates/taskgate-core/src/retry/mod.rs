//! Retry and backoff policy.
//!
//! This module encapsulates error classification (fatal, throttling, timeouts,
//! connection failures) and exponential backoff with jitter so that the
//! dispatcher and any direct callers share one consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify_status, ErrorClassifier, CIRCUIT_OPEN};
pub use error::TaskError;
pub use policy::{BackoffPolicy, ErrorKind, RetryDecision, RetryPolicy, Verdict};
pub use run::{run_with_retry, RetryRun, RetryStop};
