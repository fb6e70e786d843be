//! Error Types
//!
//! Every fallible operation in the engine reports an [`AtError`]. Handler
//! callbacks are the exception: they return `anyhow::Result<()>` and their
//! failures never escape the dispatch step, they only turn the command's
//! final response into `ERROR`.

use thiserror::Error;

/// Errors produced by the AT server engine.
#[derive(Debug, Error)]
pub enum AtError {
    /// The server was driven while it shouldn't be (e.g. no stream attached)
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A handler registration or configuration value is malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Registry growth or response buffer allocation failed
    #[error("out of memory")]
    NoMemory,

    /// No handler matched a removal request
    #[error("command handler not found")]
    NotFound,

    /// The line buffer filled up before a line terminator arrived
    #[error("command line exceeds buffer capacity of {capacity} bytes")]
    LineTooLong { capacity: usize },

    /// Formatting or other edge failures
    #[error("unknown error: {0}")]
    Unknown(String),

    /// The stream did not become writable within the configured timeout
    #[error("stream timed out")]
    Timeout,

    /// The peer closed the stream
    #[error("stream closed")]
    StreamClosed,

    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type AtResult<T> = Result<T, AtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_too_long_message() {
        let err = AtError::LineTooLong { capacity: 512 };
        assert_eq!(
            err.to_string(),
            "command line exceeds buffer capacity of 512 bytes"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: AtError = io.into();
        assert!(matches!(err, AtError::Io(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe));
    }
}
