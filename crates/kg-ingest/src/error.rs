//! Error types for the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the checkpoint store.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// A checkpoint exists but cannot be parsed.
    ///
    /// Never treated as "no progress": the caller resets or aborts.
    #[error("Corrupt checkpoint {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Reading or writing the checkpoint failed
    #[error("Checkpoint I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from turning an item into graph documents.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Upstream model/service call failed
    #[error("API request failed: {0}")]
    Api(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Timeout waiting for response")]
    Timeout,

    /// The model answered with something that is not a graph
    #[error("Failed to parse extraction: {0}")]
    Parse(String),

    /// The service refused the request (bad credentials, bad model, ...)
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TransformError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransformError::Api(_)
                | TransformError::RateLimited
                | TransformError::Timeout
                | TransformError::Parse(_)
        )
    }
}

/// Errors from committing graph documents.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Could not reach the store
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store-side failure that is expected to clear (deadlock, leader switch, ...)
    #[error("Transient store error {code}: {message}")]
    Transient { code: String, message: String },

    /// Store-side failure that will repeat (syntax, constraint, auth)
    #[error("Store error {code}: {message}")]
    Query { code: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The sink was already closed
    #[error("Sink closed")]
    Closed,
}

impl SinkError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SinkError::Connection(_) | SinkError::Io(_) | SinkError::Transient { .. }
        )
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err.to_string())
    }
}

/// Failure of a single transform-then-commit attempt.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("commit failed: {0}")]
    Sink(#[from] SinkError),
}

impl AttemptError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Transform(e) => e.is_retryable(),
            AttemptError::Sink(e) => e.is_retryable(),
        }
    }
}

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CheckpointError::Corrupt {
            path: PathBuf::from("/tmp/run.checkpoint.json"),
            reason: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt checkpoint /tmp/run.checkpoint.json: expected value at line 1 column 1"
        );

        let err = AttemptError::from(TransformError::RateLimited);
        assert_eq!(err.to_string(), "transform failed: Rate limit exceeded");
    }

    #[test]
    fn test_retry_classification() {
        assert!(TransformError::Timeout.is_retryable());
        assert!(TransformError::Parse("no json".into()).is_retryable());
        assert!(!TransformError::Rejected("401".into()).is_retryable());
        assert!(!TransformError::Config("no key".into()).is_retryable());

        assert!(SinkError::Connection("refused".into()).is_retryable());
        assert!(SinkError::Transient {
            code: "Neo.TransientError.Transaction.DeadlockDetected".into(),
            message: "deadlock".into(),
        }
        .is_retryable());
        assert!(!SinkError::Closed.is_retryable());

        assert!(AttemptError::from(SinkError::Connection("x".into())).is_retryable());
        assert!(!AttemptError::from(TransformError::Config("x".into())).is_retryable());
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let sink_err: SinkError = json_err.into();
        assert!(matches!(sink_err, SinkError::Serialization(_)));
    }
}
