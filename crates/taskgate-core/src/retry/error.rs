//! Error type produced by task bodies and batch clients.

/// Failure reported by a single attempt of a task.
///
/// The dispatcher never inspects task semantics; it only looks at the
/// `fatal` flag, the optional `code`, the optional HTTP `status` and the
/// message text to decide whether another attempt is worthwhile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
    /// Never retry this error, regardless of remaining attempts.
    pub fatal: bool,
    /// Machine-readable code, e.g. `ECONNRESET` or `CIRCUIT_OPEN`.
    pub code: Option<String>,
    /// HTTP status of the downstream response, when there was one.
    pub status: Option<u16>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
            code: None,
            status: None,
        }
    }

    /// Mark the error as fatal.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(e: anyhow::Error) -> Self {
        TaskError::new(format!("{:#}", e))
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        TaskError::new(message)
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        TaskError::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_fields() {
        let e = TaskError::new("upstream said no")
            .with_code("ECONNRESET")
            .with_status(502)
            .fatal();
        assert_eq!(e.message, "upstream said no");
        assert_eq!(e.code.as_deref(), Some("ECONNRESET"));
        assert_eq!(e.status, Some(502));
        assert!(e.fatal);
        assert_eq!(e.to_string(), "upstream said no");
    }

    #[test]
    fn from_anyhow_keeps_context_chain() {
        let err = anyhow::anyhow!("socket hang up").context("calling generator");
        let e = TaskError::from(err);
        assert!(e.message.contains("calling generator"));
        assert!(e.message.contains("socket hang up"));
        assert!(!e.fatal);
    }
}
