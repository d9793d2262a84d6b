//! Agent Core error types.

use thiserror::Error;

/// Errors that end a turn without a usable outcome.
///
/// Upstream model failures are not errors at this level: the orchestrator
/// reports them to the client and returns an aborted `TurnOutcome`.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Writing a reply to the client failed; the connection is gone.
    #[error("client disconnected: {reason}")]
    ClientDisconnected { reason: String },
}
