//! ConversationHistory: the append-only message log of one session.
//!
//! Responsibilities:
//! - Keep the system prompt as the first and only system message
//! - Append user, assistant, tool-call and tool-result messages in order
//! - Hand the full history to the inference client on every request
//! - Estimate history size in words for the soft context-length check
//!
//! There is no eviction and no persistence: the history lives exactly as long
//! as the WebSocket session that owns it.

use crate::inference::types::{ChatMessage, Role, ToolCall};

/// Ordered, append-only conversation history.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Start a history whose first message is `system_prompt`.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    /// All messages, system prompt first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    // ─── Appends ────────────────────────────────────────────────────────

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Record the tool calls the model requested, verbatim.
    pub fn push_tool_calls(&mut self, tool_calls: Vec<ToolCall>) {
        self.messages.push(ChatMessage::assistant_tool_calls(tool_calls));
    }

    /// Append a tool result.
    ///
    /// Results must follow the assistant tool-call message they answer
    /// (possibly after sibling results of the same batch). Anything else is a
    /// logic error in the caller and is dropped with a log line.
    pub fn push_tool_result(&mut self, result: ChatMessage) {
        if result.role != Role::Tool || !self.awaiting_tool_results() {
            tracing::error!(
                role = ?result.role,
                tool = ?result.tool_name,
                "tool result without a preceding tool-call message, dropped"
            );
            return;
        }
        self.messages.push(result);
    }

    /// Whether the tail of the history is a tool-call message followed only
    /// by tool results.
    fn awaiting_tool_results(&self) -> bool {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role != Role::Tool)
            .is_some_and(|m| m.role == Role::Assistant && m.tool_calls.is_some())
    }

    // ─── Size ───────────────────────────────────────────────────────────

    /// Whitespace-separated words across every message's content.
    pub fn word_count(&self) -> usize {
        self.messages.iter().map(|m| count_words(&m.content)).sum()
    }
}

/// Whitespace-separated word count of `text`.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
