//! Retry loop: run an async operation until success or the policy says stop.

use std::future::Future;
use std::time::Duration;

use super::classify::ErrorClassifier;
use super::error::TaskError;
use super::policy::{RetryDecision, RetryPolicy};

/// Why the retry loop stopped without a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStop {
    Fatal(TaskError),
    /// Retryable, but the attempt budget ran out. Carries the last error.
    Exhausted(TaskError),
    NotRetryable(TaskError),
}

impl RetryStop {
    pub fn error(&self) -> &TaskError {
        match self {
            RetryStop::Fatal(e) | RetryStop::Exhausted(e) | RetryStop::NotRetryable(e) => e,
        }
    }
}

/// Result of [`run_with_retry`] plus the number of invocations made.
#[derive(Debug)]
pub struct RetryRun<T> {
    pub attempts: u32,
    pub result: Result<T, RetryStop>,
}

/// Invokes `f` until it succeeds or the policy says to stop.
///
/// On a retryable failure `on_retry(attempt, error, delay)` is called, then the
/// loop sleeps for `delay` and tries again. `attempt` is 0-based.
pub async fn run_with_retry<T, F, Fut, R>(
    policy: &RetryPolicy,
    classifier: &ErrorClassifier,
    mut f: F,
    mut on_retry: R,
) -> RetryRun<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TaskError>>,
    R: FnMut(u32, &TaskError, Duration),
{
    let mut attempt = 0u32;
    loop {
        let err = match f().await {
            Ok(value) => {
                return RetryRun {
                    attempts: attempt + 1,
                    result: Ok(value),
                }
            }
            Err(e) => e,
        };

        let stop = match policy.decide(attempt, classifier.classify(&err)) {
            RetryDecision::RetryAfter(delay) => {
                on_retry(attempt, &err, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            RetryDecision::Fatal => RetryStop::Fatal(err),
            RetryDecision::Exhausted => RetryStop::Exhausted(err),
            RetryDecision::NotRetryable => RetryStop::NotRetryable(err),
        };
        return RetryRun {
            attempts: attempt + 1,
            result: Err(stop),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fixed_policy(max_retries: u32) -> RetryPolicy {
        let mut p = RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        };
        p.backoff.base_delay = Duration::from_millis(100);
        p.backoff.jitter_max = 1.0;
        p
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let mut delays = Vec::new();
        let run = run_with_retry(
            &fixed_policy(3),
            &ErrorClassifier::new(),
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TaskError::new("ECONNRESET"))
                } else {
                    Ok("done")
                }
            },
            |_, _, d| delays.push(d),
        )
        .await;
        assert_eq!(run.attempts, 3);
        assert_eq!(run.result, Ok("done"));
        assert_eq!(
            delays,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget() {
        let run: RetryRun<()> = run_with_retry(
            &fixed_policy(2),
            &ErrorClassifier::new(),
            || async { Err(TaskError::new("503 Service Unavailable")) },
            |_, _, _| {},
        )
        .await;
        assert_eq!(run.attempts, 3);
        assert!(matches!(run.result, Err(RetryStop::Exhausted(_))));
    }

    #[tokio::test]
    async fn fatal_and_terminal_stop_at_first_attempt() {
        let run: RetryRun<()> = run_with_retry(
            &fixed_policy(5),
            &ErrorClassifier::new(),
            || async { Err(TaskError::new("ECONNRESET").fatal()) },
            |_, _, _| panic!("fatal errors must not be retried"),
        )
        .await;
        assert_eq!(run.attempts, 1);
        assert!(matches!(run.result, Err(RetryStop::Fatal(_))));

        let run: RetryRun<()> = run_with_retry(
            &fixed_policy(5),
            &ErrorClassifier::new(),
            || async { Err(TaskError::new("content policy violation")) },
            |_, _, _| panic!("terminal errors must not be retried"),
        )
        .await;
        assert_eq!(run.attempts, 1);
        assert!(matches!(run.result, Err(RetryStop::NotRetryable(_))));
    }
}
