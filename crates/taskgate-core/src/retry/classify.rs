//! Classify task errors into retry policy error kinds.

use crate::retry::error::TaskError;
use crate::retry::policy::{ErrorKind, Verdict};

/// Sentinel code a task uses to signal an open circuit breaker. Never retried.
pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";

/// Transient-error vocabulary, matched case-insensitively as substrings of the
/// error message and code. First match wins.
const TRANSIENT_PATTERNS: &[(&str, ErrorKind)] = &[
    ("etimedout", ErrorKind::Timeout),
    ("timed out", ErrorKind::Timeout),
    ("timeout", ErrorKind::Timeout),
    ("econnreset", ErrorKind::Connection),
    ("connection reset", ErrorKind::Connection),
    ("econnrefused", ErrorKind::Connection),
    ("connection refused", ErrorKind::Connection),
    ("socket hang up", ErrorKind::Connection),
    ("network error", ErrorKind::Connection),
    ("enotfound", ErrorKind::Connection),
    ("eai_again", ErrorKind::Connection),
    ("service unavailable", ErrorKind::Unavailable),
    ("bad gateway", ErrorKind::Unavailable),
    ("502", ErrorKind::Unavailable),
    ("503", ErrorKind::Unavailable),
    ("rate limit", ErrorKind::Throttled),
    ("too many requests", ErrorKind::Throttled),
    ("429", ErrorKind::Throttled),
];

/// Classify an HTTP status code for retry decisions.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::Throttled,
        502..=504 => ErrorKind::Unavailable,
        408 => ErrorKind::Timeout,
        _ => ErrorKind::Other,
    }
}

/// Ordered rule set: fatal flag, circuit-open sentinel, HTTP status, then the
/// transient vocabulary plus any configured extra patterns.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    extra_patterns: Vec<String>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier that also treats the given substrings as transient.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extra_patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, e: &TaskError) -> ErrorKind {
        if e.fatal {
            return ErrorKind::Fatal;
        }
        if let Some(code) = e.code.as_deref() {
            if code.eq_ignore_ascii_case(CIRCUIT_OPEN) {
                return ErrorKind::Fatal;
            }
        }
        if let Some(status) = e.status {
            let kind = classify_status(status);
            if kind != ErrorKind::Other {
                return kind;
            }
        }

        let message = e.message.to_lowercase();
        let code = e.code.as_deref().map(str::to_lowercase).unwrap_or_default();
        let matches = |pattern: &str| message.contains(pattern) || code.contains(pattern);

        for (pattern, kind) in TRANSIENT_PATTERNS {
            if matches(pattern) {
                return *kind;
            }
        }
        if self.extra_patterns.iter().any(|p| matches(p)) {
            return ErrorKind::Transient;
        }
        ErrorKind::Other
    }

    pub fn verdict(&self, e: &TaskError) -> Verdict {
        self.classify(e).verdict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_flag_wins_over_transient_message() {
        let c = ErrorClassifier::new();
        let e = TaskError::new("ECONNRESET").fatal();
        assert_eq!(c.classify(&e), ErrorKind::Fatal);
        assert_eq!(c.verdict(&e), Verdict::Fatal);
    }

    #[test]
    fn circuit_open_code_is_fatal() {
        let c = ErrorClassifier::new();
        let e = TaskError::new("breaker tripped, request timeout").with_code("circuit_open");
        assert_eq!(c.verdict(&e), Verdict::Fatal);
    }

    #[test]
    fn transient_messages_are_retryable_case_insensitively() {
        let c = ErrorClassifier::new();
        for msg in [
            "read ECONNRESET",
            "Request Timeout after 30s",
            "connect ECONNREFUSED 127.0.0.1:443",
            "Service Unavailable",
            "Rate limit reached for requests",
            "HTTP 429",
            "upstream returned 502",
            "getaddrinfo ENOTFOUND api.example.com",
        ] {
            assert_eq!(c.verdict(&TaskError::new(msg)), Verdict::Retryable, "{msg}");
        }
    }

    #[test]
    fn code_is_matched_against_vocabulary() {
        let c = ErrorClassifier::new();
        let e = TaskError::new("request failed").with_code("ETIMEDOUT");
        assert_eq!(c.classify(&e), ErrorKind::Timeout);
    }

    #[test]
    fn status_codes() {
        assert_eq!(classify_status(429), ErrorKind::Throttled);
        assert_eq!(classify_status(503), ErrorKind::Unavailable);
        assert_eq!(classify_status(502), ErrorKind::Unavailable);
        assert_eq!(classify_status(404), ErrorKind::Other);
        assert_eq!(classify_status(400), ErrorKind::Other);
    }

    #[test]
    fn unknown_errors_are_terminal() {
        let c = ErrorClassifier::new();
        let e = TaskError::new("invalid prompt: empty input").with_status(400);
        assert_eq!(c.verdict(&e), Verdict::Terminal);
    }

    #[test]
    fn extra_patterns_extend_vocabulary() {
        let c = ErrorClassifier::with_patterns(["Model Overloaded"]);
        let e = TaskError::new("model overloaded, try again");
        assert_eq!(c.classify(&e), ErrorKind::Transient);
        assert_eq!(ErrorClassifier::new().verdict(&e), Verdict::Terminal);
    }
}
