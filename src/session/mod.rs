//! Session: one WebSocket connection, one document, one conversation.
//!
//! Submodules:
//! - `runner`: The session loop (document upload, then user turns)
//! - `transport`: Client connection abstraction and its WebSocket adapter
//! - `errors`: Session-level error types

pub mod errors;
pub mod runner;
pub mod transport;

// Re-exports for convenience
pub use errors::SessionError;
pub use runner::{run_session, SessionEnd, MIN_DOCUMENT_CHARS, REJECT_MESSAGE};
pub use transport::{ClientTransport, WsTransport};
