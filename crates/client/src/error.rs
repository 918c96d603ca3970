//! Errors raised at the flush boundary.
//!
//! None of these reach callers of the manager's edit methods: the flush
//! routine classifies them and reports through the notification surface.

use thiserror::Error;

/// Errors that can occur while sending a batch.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request was superseded by a newer flush or shut down.
    #[error("Request cancelled")]
    Cancelled,

    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The transport could not be set up.
    #[error("Transport configuration error: {0}")]
    Config(String),

    /// The send task ended without producing a result.
    #[error("Send task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Whether this is a cancellation rather than a genuine failure.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the operations should be re-queued and retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !self.is_cancellation()
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Task(err.to_string())
        }
    }
}
