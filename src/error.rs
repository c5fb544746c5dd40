//! Error taxonomy for calls against the remote authority
//!
//! Any non-2xx response is a failure. The body is not guaranteed to be
//! structured, so it is carried verbatim as opaque diagnostic text. The
//! client performs no automatic retries; a failure is terminal for that one
//! call and the operator retries explicitly.

use thiserror::Error;

/// Failure of a single remote operation.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The referenced id or domain does not exist server-side. Surfaced to
    /// the operator, never retried.
    #[error("not found: {context}")]
    NotFound { context: String },

    /// A 4xx other than not-found (malformed payload, duplicate, ...).
    #[error("rejected by authority ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Network failure, 5xx, or an undecodable success body. Safe to retry
    /// manually; the current view keeps its last good snapshot.
    #[error("transient failure: {reason}")]
    Transient { reason: String },
}

impl RemoteError {
    /// Classify a non-2xx response by status code. Pure, so the mapping is
    /// testable without a socket.
    pub fn from_status(status: u16, body: String, context: &str) -> Self {
        match status {
            404 => RemoteError::NotFound {
                context: context.to_string(),
            },
            400..=499 => RemoteError::Rejected { status, body },
            _ => RemoteError::Transient {
                reason: format!("{} returned status {}: {}", context, status, body),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    /// Whether a manual retry might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transient {
            reason: err.to_string(),
        }
    }
}
