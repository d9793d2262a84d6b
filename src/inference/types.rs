//! Shared types for the Ollama client.
//!
//! These mirror the Ollama native `/api/chat` and `/api/show` payloads, used
//! for both request building and streamed response decoding.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
///
/// `content` is always serialized, as `""` for assistant tool-call messages.
/// Ollama accepts an empty string there but some builds reject a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Assistant messages may carry the tool calls the model requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool results name the tool that produced them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message recording the raw tool calls the model asked for.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(tool_calls),
            tool_name: None,
        }
    }

    /// Tool-role message carrying a tool's output back to the model.
    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_name: Some(tool_name.into()),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool definition sent in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "no_tools")]
    pub tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

/// Request body for `POST /api/show`.
#[derive(Debug, Clone, Serialize)]
pub struct ShowRequest<'a> {
    pub model: &'a str,
}

/// The part of the `/api/show` response we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowResponse {
    #[serde(default)]
    pub model_info: Option<serde_json::Map<String, serde_json::Value>>,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// A tool call requested by the model, in Ollama's native shape.
///
/// `arguments` is a JSON object (not a string as in the OpenAI API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: ToolCallFunction,
}

impl ToolCall {
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Function name and arguments within a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One NDJSON line of a streamed `/api/chat` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamFragment {
    #[serde(default)]
    pub message: Option<FragmentMessage>,
    #[serde(default)]
    pub done: bool,
    /// Ollama reports mid-stream failures as `{"error": "..."}`.
    #[serde(default)]
    pub error: Option<String>,
}

/// The incremental message carried by a fragment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FragmentMessage {
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning tokens from thinking models (gpt-oss). Decoded so they don't
    /// trip the decoder, never forwarded.
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl StreamFragment {
    /// Text content carried by this fragment, if any.
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Tool calls carried by this fragment (empty when none).
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message
            .as_ref()
            .and_then(|m| m.tool_calls.as_deref())
            .unwrap_or(&[])
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
