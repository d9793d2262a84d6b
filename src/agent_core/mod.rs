//! Agent Core: orchestration layer for document chat sessions.
//!
//! Submodules:
//! - `clause_scan`: Keyword scan that flags negative and cautionary clauses
//! - `conversation`: Append-only conversation history
//! - `orchestrator`: Per-turn state machine (model ⇄ tool round trips)
//! - `prompts`: System prompt construction
//! - `tool_router`: Advertised tool definitions and local dispatch
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod clause_scan;
pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod prompts;
pub mod tool_router;
pub mod types;

// Re-exports for convenience
pub use clause_scan::analyze_document;
pub use conversation::ConversationHistory;
pub use errors::AgentError;
pub use orchestrator::{Orchestrator, ReplySink};
pub use tool_router::{ToolRouter, ANALYZE_TOOL_NAME};
pub use types::{Document, TurnAbort, TurnOutcome};
