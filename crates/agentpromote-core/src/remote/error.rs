//! Remote service errors

use thiserror::Error;

/// Errors from the agent-configuration service or the object store
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context}: HTTP {status}")]
    Status {
        /// What was being attempted
        context: String,
        /// Response status code
        status: u16,
    },

    #[error("operation {name} failed: {message}")]
    OperationFailed {
        /// Server-side operation name
        name: String,
        /// Error message reported by the service
        message: String,
    },

    #[error("unexpected response: {0}")]
    MalformedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
