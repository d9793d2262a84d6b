//! Shared types across the agent core.

use std::sync::Arc;

// ─── Document ───────────────────────────────────────────────────────────────

/// The text uploaded at the start of a session.
///
/// Immutable and cheap to clone. The web client concatenates multiple files,
/// each introduced by a `--- name (TYPE) ---` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: Arc<str>,
}

impl Document {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// File names announced by `--- name (TYPE) ---` header lines.
    pub fn file_names(&self) -> Vec<&str> {
        self.text
            .lines()
            .filter_map(|line| {
                let inner = line.trim().strip_prefix("--- ")?.strip_suffix(" ---")?;
                let (name, kind) = inner.rsplit_once(" (")?;
                kind.ends_with(')').then_some(name)
            })
            .collect()
    }
}

// ─── Turn outcome ───────────────────────────────────────────────────────────

/// How a user turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without requesting further tools.
    Completed { model_calls: u32 },
    /// The model kept requesting tools past the configured bound.
    RoundLimitReached { model_calls: u32 },
    /// The turn was abandoned; history and connection are intact.
    Aborted(TurnAbort),
}

/// Why a turn was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAbort {
    /// Opening the chat request failed (connect error or non-2xx).
    RequestFailed { after_tool_call: bool },
    /// A streamed fragment could not be decoded, or the stream broke.
    StreamFailed { after_tool_call: bool },
}
