//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while talking to the Ollama server.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout on {endpoint}")]
    Timeout { endpoint: String },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// A streamed line could not be decoded into a fragment.
    #[error("failed to decode stream fragment: {reason} (line: {line})")]
    DecodeError { line: String, reason: String },

    /// The server reported an error in-band, inside the NDJSON stream.
    #[error("stream error: {reason}")]
    StreamError { reason: String },
}

impl InferenceError {
    /// Whether this error happened before any response body was read.
    ///
    /// Request failures are reported to the client; decode failures are only
    /// logged.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::HttpError { .. }
        )
    }

    pub(crate) fn from_reqwest(endpoint: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }
}
