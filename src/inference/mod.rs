//! Inference Client: Ollama native API client.
//!
//! This module handles all communication with the local model server:
//! - Streamed chat requests (`/api/chat`, NDJSON responses)
//! - Model metadata lookup (`/api/show`) for the context window size
//! - Liveness probing (`/api/tags`)
//!
//! The rest of the crate talks to the model through the [`ModelGateway`]
//! trait, so the tool-call cycle can be tested without a server.

pub mod client;
pub mod errors;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use client::{FragmentStream, ModelGateway, OllamaClient};
pub use errors::InferenceError;
pub use types::{ChatMessage, Role, StreamFragment, ToolCall, ToolDefinition};
