//! Webhook send errors, classified for retry decisions.
//!
//! - **Transient**: connection failures, timeouts, HTTP 429 and 5xx other
//!   than 501. Worth another attempt after a backoff.
//! - **Permanent**: every other non-2xx status, and request construction
//!   failures. Retrying the same request would fail the same way.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorKind {
    Transient,
    Permanent,
}

impl SendErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, SendErrorKind::Transient)
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    /// Building the client failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response.
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The target answered with a non-2xx status.
    #[error("webhook returned HTTP {status}")]
    Status { status: StatusCode },
}

impl SendError {
    pub fn kind(&self) -> SendErrorKind {
        match self {
            SendError::Client(_) => SendErrorKind::Permanent,
            SendError::Request(e) => classify_transport(e),
            SendError::Status { status } => classify_status(*status),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SendError::Status { status } => Some(*status),
            SendError::Request(e) => e.status(),
            SendError::Client(_) => None,
        }
    }
}

fn classify_transport(e: &reqwest::Error) -> SendErrorKind {
    if e.is_builder() || e.is_redirect() {
        SendErrorKind::Permanent
    } else {
        SendErrorKind::Transient
    }
}

/// Classifies a non-2xx response status.
pub fn classify_status(status: StatusCode) -> SendErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
    {
        SendErrorKind::Transient
    } else {
        SendErrorKind::Permanent
    }
}
