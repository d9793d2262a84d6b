//! ToolRouter: dispatches model tool calls to local capabilities.
//!
//! There is exactly one capability, `analyze_document_sentiments`, backed by
//! the keyword clause scan. Calls naming anything else are not answered: the
//! orchestrator still records them in the tool-call message, but no tool
//! result follows for them.

use serde_json::json;

use crate::inference::types::{ChatMessage, FunctionDefinition, ToolCall, ToolDefinition};

use super::clause_scan::analyze_document;
use super::types::Document;

/// Name the model uses to request the clause scan.
pub const ANALYZE_TOOL_NAME: &str = "analyze_document_sentiments";

/// Knows the advertised tools and how to answer calls to them.
#[derive(Debug, Clone)]
pub struct ToolRouter {
    definitions: Vec<ToolDefinition>,
}

impl Default for ToolRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRouter {
    pub fn new() -> Self {
        Self {
            definitions: vec![ToolDefinition {
                r#type: "function".to_string(),
                function: FunctionDefinition {
                    name: ANALYZE_TOOL_NAME.to_string(),
                    description:
                        "Analyze the document for clauses with negative or cautionary sentiment."
                            .to_string(),
                    parameters: json!({ "type": "object", "properties": {} }),
                },
            }],
        }
    }

    /// Tool definitions advertised on every chat request.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Execute `tool_call` against `document`.
    ///
    /// Returns the tool-result message to append, or `None` for an unknown
    /// tool name. Arguments are ignored: the only tool takes none.
    pub fn dispatch(&self, tool_call: &ToolCall, document: &Document) -> Option<ChatMessage> {
        match tool_call.name() {
            ANALYZE_TOOL_NAME => {
                tracing::info!(tool = ANALYZE_TOOL_NAME, "tool called");
                let report = analyze_document(document.as_str());
                Some(ChatMessage::tool_result(ANALYZE_TOOL_NAME, report))
            }
            other => {
                tracing::warn!(tool = %other, "unknown tool requested, no result produced");
                None
            }
        }
    }
}
