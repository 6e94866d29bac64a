use std::io;

use thiserror::Error;

use crate::stream::TeeError;

/// Errors reported by [`Sink`](crate::sink::Sink) operations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Creating the pipe, duplicating a handle or preparing the source failed.
    #[error("Failed to set up sink: {0}")]
    Setup(#[source] io::Error),

    #[error("Failed to spawn copy thread: {0}")]
    Spawn(#[source] io::Error),

    /// Attached destination stopped accepting buffered bytes.
    #[error("Short write flushing buffered output: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Attached destination failed while taking buffered bytes.
    #[error("Failed to flush buffered output after {written} of {expected} bytes: {source}")]
    Flush {
        written: usize,
        expected: usize,
        #[source]
        source: io::Error,
    },

    #[error("Failed to flush destination: {0}")]
    DestinationFlush(#[source] io::Error),

    #[error("Sink already closed")]
    AlreadyClosed,

    #[error("Failed to close source: {0}")]
    Close(#[source] io::Error),

    /// The background copy ended with an error (including duplication failures).
    #[error("Copy from source failed: {0}")]
    Copy(#[source] io::Error),
}

impl SinkError {
    /// Attach failures leave the buffer intact and can be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SinkError::ShortWrite { .. } | SinkError::Flush { .. })
    }

    /// The duplication failure that stopped the copy, if that is what happened.
    pub fn tee_error(&self) -> Option<&TeeError> {
        match self {
            SinkError::Copy(err) => err.get_ref().and_then(|e| e.downcast_ref::<TeeError>()),
            _ => None,
        }
    }

    /// Get error type string for log fields
    pub fn error_type(&self) -> &'static str {
        match self {
            SinkError::Setup(_) => "setup_error",
            SinkError::Spawn(_) => "spawn_error",
            SinkError::ShortWrite { .. } => "short_write",
            SinkError::Flush { .. } => "flush_error",
            SinkError::DestinationFlush(_) => "destination_flush_error",
            SinkError::AlreadyClosed => "already_closed",
            SinkError::Close(_) => "close_error",
            SinkError::Copy(_) => "copy_error",
        }
    }
}
