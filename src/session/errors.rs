//! Session error types.

use thiserror::Error;

/// Errors at the client connection boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading a frame from the client failed.
    #[error("receive failed: {reason}")]
    ReceiveFailed { reason: String },

    /// Writing a frame to the client failed.
    #[error("send failed: {reason}")]
    SendFailed { reason: String },

    /// The connection closed before the document arrived.
    #[error("connection closed before the document was uploaded")]
    MissingDocument,

    /// The uploaded document is below the minimum length.
    #[error("document too short: {chars} chars (min {min})")]
    DocumentTooShort { chars: usize, min: usize },
}
