//! Synchronization error types.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for every client-side operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The network or connection failed before a response arrived.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("request rejected with status {status}: {detail}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// Human-readable detail from the response body.
        detail: String,
    },

    /// A success response carried a body that did not decode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A single stream frame could not be parsed.
    #[error("malformed stream frame: {0}")]
    MalformedFrame(String),

    /// The stream delivered an explicit `error` event.
    #[error("stream aborted: {0}")]
    StreamAborted(String),

    /// A client-side timeout expired.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The client refused to send a request with invalid arguments.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The session was torn down before the request could be delivered.
    #[error("session closed")]
    SessionClosed,

    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Returns the human-readable detail surfaced to the user.
    ///
    /// Rejected requests surface the server's own message; everything else
    /// surfaces the error's display form.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Rejected { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Returns `true` for errors that only invalidate a single stream frame.
    #[must_use]
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::MalformedFrame(_))
    }

    /// Returns `true` when the request may have reached the service before
    /// failing, so server-side state could have changed anyway.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}
