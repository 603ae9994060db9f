use std::time::Duration;

/// High-level classification of a task error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Explicitly fatal (flag or circuit-open sentinel). Never retried.
    Fatal,
    /// Operation timed out.
    Timeout,
    /// Downstream asked us to slow down (429, rate limit).
    Throttled,
    /// Network-level failure (connection reset/refused, DNS).
    Connection,
    /// Downstream temporarily unavailable (502, 503, 504).
    Unavailable,
    /// Matched a configured extra transient pattern.
    Transient,
    /// Any other error (not retried).
    Other,
}

/// Three-way verdict used by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fatal,
    Retryable,
    Terminal,
}

impl ErrorKind {
    pub fn verdict(self) -> Verdict {
        match self {
            ErrorKind::Fatal => Verdict::Fatal,
            ErrorKind::Timeout
            | ErrorKind::Throttled
            | ErrorKind::Connection
            | ErrorKind::Unavailable
            | ErrorKind::Transient => Verdict::Retryable,
            ErrorKind::Other => Verdict::Terminal,
        }
    }
}

/// Decision returned by the retry policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    RetryAfter(Duration),
    /// Fatal error; stop immediately.
    Fatal,
    /// Retryable, but no attempts remain.
    Exhausted,
    /// Not a transient error.
    NotRetryable,
}

/// Exponential backoff with multiplicative jitter.
///
/// `delay = min(max_delay, base_delay * factor^attempt) * jitter`, with
/// `jitter` drawn uniformly from `[jitter_min, jitter_max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter_min: 1.0,
            jitter_max: 1.3,
        }
    }
}

impl BackoffPolicy {
    /// Backoff before retrying after the failure of attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_max > self.jitter_min {
            self.jitter_min + rand::random::<f64>() * (self.jitter_max - self.jitter_min)
        } else {
            self.jitter_min
        };
        self.delay_with_jitter(attempt, jitter)
    }

    /// Deterministic form of [`delay`](Self::delay) for a given jitter factor.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = self.factor.powi(attempt.min(i32::MAX as u32) as i32);
        let raw = self.base_delay.as_secs_f64() * exp;
        let capped = if raw.is_finite() {
            raw.min(self.max_delay.as_secs_f64())
        } else {
            self.max_delay.as_secs_f64()
        };
        Duration::from_secs_f64((capped * jitter.max(0.0)).max(0.0))
    }
}

/// Attempt budget plus backoff. Attempts run from 0 through `max_retries`
/// inclusive, so a task gets at most `max_retries + 1` invocations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after attempt `attempt` (0-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        match kind.verdict() {
            Verdict::Fatal => RetryDecision::Fatal,
            Verdict::Terminal => RetryDecision::NotRetryable,
            Verdict::Retryable if attempt >= self.max_retries => RetryDecision::Exhausted,
            Verdict::Retryable => RetryDecision::RetryAfter(self.backoff.delay(attempt)),
        }
    }
}
