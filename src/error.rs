//! Failure taxonomy for calls made against the backend services
//!
//! Every network call issued by the dashboard ends in one of three failure
//! classes. They are caught at the component that issued the call and turned
//! into data (an unhealthy probe result, a retained stats record or an order
//! recorded with an error status), so none of them ever reaches the scheduler.

use std::fmt;

/// Result type alias for a single backend call
pub type FetchResult<T> = Result<T, FetchFailure>;

/// Broad classification of a [`FetchFailure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network unreachable, connection refused or timed out
    Transport,

    /// The remote answered with a non-2xx status
    Protocol,

    /// The response body could not be interpreted
    Parse,
}

/// Why a single call against a backend service failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Connection-level failure (refused, DNS, reset, ...)
    Transport(String),

    /// The per-call timeout elapsed before a response arrived
    Timeout,

    /// Non-2xx HTTP status
    Protocol { status: u16 },

    /// Malformed or unexpected body
    Parse(String),
}

impl FetchFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchFailure::Transport(_) | FetchFailure::Timeout => FailureKind::Transport,
            FetchFailure::Protocol { .. } => FailureKind::Protocol,
            FetchFailure::Parse(_) => FailureKind::Parse,
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Transport(msg) => write!(f, "request failed: {msg}"),
            FetchFailure::Timeout => write!(f, "request timed out"),
            FetchFailure::Protocol { status } => write!(f, "unexpected status code: {status}"),
            FetchFailure::Parse(msg) => write!(f, "invalid response body: {msg}"),
        }
    }
}

impl std::error::Error for FetchFailure {}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Timeout
        } else if err.is_decode() {
            FetchFailure::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            FetchFailure::Protocol {
                status: status.as_u16(),
            }
        } else {
            FetchFailure::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchFailure {
    fn from(err: serde_json::Error) -> Self {
        FetchFailure::Parse(err.to_string())
    }
}
