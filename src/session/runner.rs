//! The session loop.
//!
//! Lifecycle of one connection:
//! 1. Look up the model's context length (best effort, 0 when unknown)
//! 2. Read the first frame as the document; reject short or missing uploads
//! 3. Seed the history with the system prompt (instructions + document)
//! 4. Read user turns until the client goes away, running each through the
//!    orchestrator
//!
//! The context length is only a diagnostic: exceeding it logs a warning and
//! the turn runs anyway with the full history.

use crate::agent_core::conversation::{count_words, ConversationHistory};
use crate::agent_core::orchestrator::Orchestrator;
use crate::agent_core::prompts::system_prompt;
use crate::agent_core::types::Document;
use crate::config::ServerConfig;
use crate::inference::client::ModelGateway;

use super::errors::SessionError;
use super::transport::ClientTransport;

/// Minimum document length, in characters.
pub const MIN_DOCUMENT_CHARS: usize = 20;

/// Sent before closing a connection whose upload was rejected.
pub const REJECT_MESSAGE: &str =
    "Invalid request: document data required (min 20 chars). Disconnecting.";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The document upload was missing or too short.
    Rejected,
    /// The client closed the connection (or a read failed).
    ClientClosed { turns: u32 },
    /// A reply could not be delivered to the client.
    ClientGone { turns: u32 },
}

/// Drive one client connection from document upload to disconnect.
pub async fn run_session<G, T>(gateway: &G, config: &ServerConfig, mut transport: T) -> SessionEnd
where
    G: ModelGateway,
    T: ClientTransport,
{
    let context_length = gateway.context_length(&config.model).await;
    tracing::info!(
        model = %config.model,
        context_length = context_length,
        "model context length"
    );

    let first = transport.recv_frame().await;
    let document = match accept_document(first) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting session");
            if let Err(e) = transport.send_frame(REJECT_MESSAGE.to_string()).await {
                tracing::debug!(error = %e, "rejection not delivered");
            }
            transport.close().await;
            return SessionEnd::Rejected;
        }
    };

    tracing::info!(
        chars = document.char_count(),
        files = ?document.file_names(),
        "document received"
    );

    let mut history = ConversationHistory::new(system_prompt(&document));
    let orchestrator = Orchestrator::new(gateway, &config.model, &document, config.max_tool_rounds);
    let mut turns: u32 = 0;

    loop {
        let user_text = match transport.recv_frame().await {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "read failed, ending session");
                break;
            }
            None => break,
        };

        let total_words = history.word_count() + count_words(&user_text);
        if context_length > 0 && total_words as u64 > context_length {
            tracing::warn!(
                total_words = total_words,
                context_length = context_length,
                "estimated context exceeded"
            );
        }

        tracing::info!(turn = turns + 1, "LLM generating message for user input");

        match orchestrator.run_turn(&mut history, &user_text, &mut transport).await {
            Ok(outcome) => {
                turns += 1;
                tracing::info!(
                    turn = turns,
                    outcome = ?outcome,
                    history_len = history.len(),
                    "turn finished"
                );
            }
            Err(e) => {
                tracing::info!(error = %e, "client gone mid-turn, ending session");
                return SessionEnd::ClientGone { turns };
            }
        }
    }

    transport.close().await;
    SessionEnd::ClientClosed { turns }
}

/// Validate the first inbound frame as the session's document.
fn accept_document(
    first: Option<Result<String, SessionError>>,
) -> Result<Document, SessionError> {
    let text = match first {
        Some(Ok(text)) => text,
        Some(Err(e)) => return Err(e),
        None => return Err(SessionError::MissingDocument),
    };

    let chars = text.chars().count();
    if chars < MIN_DOCUMENT_CHARS {
        return Err(SessionError::DocumentTooShort {
            chars,
            min: MIN_DOCUMENT_CHARS,
        });
    }
    Ok(Document::new(text))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
