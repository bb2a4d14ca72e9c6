//! Error types for requeue.

use thiserror::Error;

/// Errors that can occur across the crate.
#[derive(Debug, Error)]
pub enum RequeueError {
    /// Database open, query, or migration failure.
    #[error("database error: {0}")]
    Database(String),

    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Replay transport failure that is fatal to the call.
    #[error("transport error: {0}")]
    Transport(String),

    /// Worker process or IPC failure.
    #[error("worker error: {0}")]
    Worker(String),

    /// A queue name that is not registered with the worker.
    #[error("queue not found: \"{0}\"")]
    QueueNotFound(String),

    /// A requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or parsing failure.
    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_not_found_display() {
        let err = RequeueError::QueueNotFound("todo-post-queue".to_string());
        assert_eq!(err.to_string(), "queue not found: \"todo-post-queue\"");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RequeueError = io.into();
        assert!(matches!(err, RequeueError::Io(_)));
    }
}
