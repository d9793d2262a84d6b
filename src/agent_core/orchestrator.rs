//! Orchestrator: drives one user turn through the model and the tool cycle.
//!
//! A turn is an explicit state machine:
//!
//! ```text
//! AwaitingModel ──► Streaming ──► TurnComplete
//!      ▲                │
//!      │                ▼
//! ToolExecuted ◄── ToolRequested
//! ```
//!
//! - `AwaitingModel`: open a streamed chat request with the full history.
//! - `Streaming`: drain the stream into one reply buffer and a tool-call list.
//!   A non-empty reply is appended and sent to the client as one frame.
//! - `ToolRequested`: record the raw tool calls, run each known one.
//! - `ToolExecuted`: re-enter `AwaitingModel`, bounded by `max_tool_rounds`.
//!
//! The response stream lives inside the `Streaming` state. Leaving that state
//! (on success, decode error, or read error) drops it, which closes the HTTP
//! body before any re-invocation opens the next one.

use std::future::Future;

use futures::StreamExt;

use crate::inference::client::{FragmentStream, ModelGateway};
use crate::inference::errors::InferenceError;
use crate::inference::types::ToolCall;

use super::conversation::ConversationHistory;
use super::errors::AgentError;
use super::tool_router::ToolRouter;
use super::types::{Document, TurnAbort, TurnOutcome};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Sent to the client when the first chat request of a turn fails.
pub const LLM_UNREACHABLE: &str = "Error contacting LLM API.";

/// Sent to the client when a re-invocation after a tool call fails.
pub const LLM_UNREACHABLE_AFTER_TOOL: &str = "Error contacting LLM API after tool call.";

// ─── ReplySink ──────────────────────────────────────────────────────────────

/// Where the orchestrator delivers assistant replies and error notices.
pub trait ReplySink: Send {
    /// Deliver one complete text frame to the client.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), AgentError>> + Send;
}

// ─── Turn state ─────────────────────────────────────────────────────────────

/// States of a single user turn. `round` counts model invocations from 0.
enum TurnState {
    AwaitingModel { round: u32 },
    Streaming { round: u32, stream: FragmentStream },
    ToolRequested { round: u32, calls: Vec<ToolCall> },
    ToolExecuted { round: u32 },
    TurnComplete { round: u32 },
}

/// Everything one streamed response produced.
#[derive(Debug, Default)]
struct ModelReply {
    text: String,
    tool_calls: Vec<ToolCall>,
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Runs user turns for one session.
///
/// Borrows the session's gateway and document; the history is passed per
/// turn so the session keeps ownership of it.
pub struct Orchestrator<'a, G> {
    gateway: &'a G,
    model: &'a str,
    document: &'a Document,
    router: ToolRouter,
    max_tool_rounds: u32,
}

impl<'a, G: ModelGateway> Orchestrator<'a, G> {
    pub fn new(gateway: &'a G, model: &'a str, document: &'a Document, max_tool_rounds: u32) -> Self {
        Self {
            gateway,
            model,
            document,
            router: ToolRouter::new(),
            max_tool_rounds,
        }
    }

    /// Run one user turn to completion.
    ///
    /// Model failures are reported to `sink` and yield an aborted outcome;
    /// only a failure to reach the client itself is an `Err`.
    pub async fn run_turn<S: ReplySink>(
        &self,
        history: &mut ConversationHistory,
        user_text: &str,
        sink: &mut S,
    ) -> Result<TurnOutcome, AgentError> {
        history.push_user(user_text);
        let mut state = TurnState::AwaitingModel { round: 0 };

        loop {
            state = match state {
                TurnState::AwaitingModel { round } => {
                    match self
                        .gateway
                        .stream_chat(self.model, history.messages(), self.router.definitions())
                        .await
                    {
                        Ok(stream) => TurnState::Streaming { round, stream },
                        Err(e) => {
                            let after_tool_call = round > 0;
                            tracing::warn!(
                                round = round,
                                error = %e,
                                "chat request failed, aborting turn"
                            );
                            let notice = if after_tool_call {
                                LLM_UNREACHABLE_AFTER_TOOL
                            } else {
                                LLM_UNREACHABLE
                            };
                            sink.send_text(notice.to_string()).await?;
                            return Ok(TurnOutcome::Aborted(TurnAbort::RequestFailed {
                                after_tool_call,
                            }));
                        }
                    }
                }

                TurnState::Streaming { round, stream } => {
                    let reply = match drain_stream(stream).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            tracing::error!(round = round, error = %e, "error decoding stream");
                            return Ok(TurnOutcome::Aborted(TurnAbort::StreamFailed {
                                after_tool_call: round > 0,
                            }));
                        }
                    };

                    tracing::info!(
                        round = round,
                        reply_len = reply.text.len(),
                        tool_calls_count = reply.tool_calls.len(),
                        tool_names = ?reply.tool_calls.iter().map(|tc| tc.name()).collect::<Vec<_>>(),
                        "=== MODEL RESPONSE ==="
                    );

                    if !reply.text.is_empty() {
                        history.push_assistant(reply.text.clone());
                        sink.send_text(reply.text).await?;
                    }

                    if reply.tool_calls.is_empty() {
                        TurnState::TurnComplete { round }
                    } else {
                        TurnState::ToolRequested {
                            round,
                            calls: reply.tool_calls,
                        }
                    }
                }

                TurnState::ToolRequested { round, calls } => {
                    let results: Vec<_> = calls
                        .iter()
                        .filter_map(|call| self.router.dispatch(call, self.document))
                        .collect();
                    history.push_tool_calls(calls);
                    for result in results {
                        history.push_tool_result(result);
                    }
                    TurnState::ToolExecuted { round }
                }

                TurnState::ToolExecuted { round } => {
                    if round >= self.max_tool_rounds {
                        tracing::warn!(
                            model_calls = round + 1,
                            max_tool_rounds = self.max_tool_rounds,
                            "tool round limit reached, ending turn"
                        );
                        return Ok(TurnOutcome::RoundLimitReached {
                            model_calls: round + 1,
                        });
                    }
                    TurnState::AwaitingModel { round: round + 1 }
                }

                TurnState::TurnComplete { round } => {
                    return Ok(TurnOutcome::Completed {
                        model_calls: round + 1,
                    });
                }
            };
        }
    }
}

/// Consume a response stream until `done` or end of body.
///
/// Takes the stream by value so it is closed when this returns.
async fn drain_stream(mut stream: FragmentStream) -> Result<ModelReply, InferenceError> {
    let mut reply = ModelReply::default();

    while let Some(item) = stream.next().await {
        let fragment = item?;
        if let Some(content) = fragment.content() {
            reply.text.push_str(content);
        }
        reply.tool_calls.extend_from_slice(fragment.tool_calls());
        if fragment.done {
            break;
        }
    }

    Ok(reply)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use futures::stream;

    use crate::agent_core::tool_router::ANALYZE_TOOL_NAME;
    use crate::inference::types::{
        ChatMessage, FragmentMessage, Role, StreamFragment, ToolCallFunction, ToolDefinition,
    };

    // ─── Fakes ──────────────────────────────────────────────────────────

    type Script = Result<Vec<Result<StreamFragment, InferenceError>>, InferenceError>;

    /// Tracks whether a scripted stream has been dropped.
    struct DropFlag(Arc<AtomicUsize>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Gateway that replays scripted responses and records each request.
    #[derive(Default)]
    struct ScriptedGateway {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    impl ScriptedGateway {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                ..Self::default()
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl ModelGateway for ScriptedGateway {
        fn context_length<'a>(&'a self, _model: &'a str) -> impl Future<Output = u64> + Send + 'a {
            async { 0 }
        }

        fn stream_chat<'a>(
            &'a self,
            _model: &'a str,
            messages: &'a [ChatMessage],
            _tools: &'a [ToolDefinition],
        ) -> impl Future<Output = Result<FragmentStream, InferenceError>> + Send + 'a {
            async move {
                self.requests.lock().unwrap().push(messages.to_vec());
                let script = self
                    .scripts
                    .lock()
                    .unwrap()
                    .pop_front()
                    .expect("unexpected extra model request");
                let items = script?;
                self.opened.fetch_add(1, Ordering::SeqCst);
                let flag = DropFlag(self.closed.clone());
                let s = stream::iter(items).map(move |item| {
                    let _keep = &flag;
                    item
                });
                Ok(s.boxed())
            }
        }
    }

    /// Sink that records every frame sent to the client.
    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<String>,
        fail: bool,
    }

    impl ReplySink for RecordingSink {
        fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), AgentError>> + Send {
            let result = if self.fail {
                Err(AgentError::ClientDisconnected {
                    reason: "socket closed".into(),
                })
            } else {
                self.frames.push(text);
                Ok(())
            };
            async move { result }
        }
    }

    // ─── Fragment builders ──────────────────────────────────────────────

    fn text(content: &str) -> Result<StreamFragment, InferenceError> {
        Ok(StreamFragment {
            message: Some(FragmentMessage {
                content: Some(content.to_string()),
                ..FragmentMessage::default()
            }),
            ..StreamFragment::default()
        })
    }

    fn tool(name: &str) -> Result<StreamFragment, InferenceError> {
        Ok(StreamFragment {
            message: Some(FragmentMessage {
                tool_calls: Some(vec![ToolCall {
                    id: None,
                    function: ToolCallFunction {
                        index: None,
                        name: name.to_string(),
                        arguments: serde_json::json!({}),
                    },
                }]),
                ..FragmentMessage::default()
            }),
            ..StreamFragment::default()
        })
    }

    fn done() -> Result<StreamFragment, InferenceError> {
        Ok(StreamFragment {
            done: true,
            ..StreamFragment::default()
        })
    }

    fn decode_error() -> Result<StreamFragment, InferenceError> {
        Err(InferenceError::DecodeError {
            line: "{garbage".into(),
            reason: "EOF while parsing".into(),
        })
    }

    fn refused() -> InferenceError {
        InferenceError::ConnectionFailed {
            endpoint: "http://localhost:11434/api/chat".into(),
            reason: "connection refused".into(),
        }
    }

    const DOC: &str = "The Vendor shall indemnify the Client against all claims. \
                       Either party may terminate this agreement upon 30 days notice.";

    fn fresh_history() -> ConversationHistory {
        ConversationHistory::new("system prompt")
    }

    // ─── Tests ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_plain_reply_completes_turn() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![text("Hel"), text("lo!"), done()])]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "gpt-oss:20b", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "hi", &mut sink).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Completed { model_calls: 1 });
        assert_eq!(gateway.request_count(), 1);
        assert_eq!(sink.frames, vec!["Hello!".to_string()]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[1], ChatMessage::user("hi"));
        assert_eq!(history.messages()[2], ChatMessage::assistant("Hello!"));
    }

    #[tokio::test]
    async fn test_analyze_tool_call_round_trip() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool(ANALYZE_TOOL_NAME), done()]),
            Ok(vec![text("The indemnity clause is one-sided."), done()]),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "gpt-oss:20b", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch
            .run_turn(&mut history, "spot the risks", &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Completed { model_calls: 2 });
        assert_eq!(gateway.request_count(), 2);
        assert_eq!(sink.frames, vec!["The indemnity clause is one-sided.".to_string()]);

        let msgs = history.messages();
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[2].role, Role::Assistant);
        assert_eq!(msgs[2].tool_calls.as_ref().unwrap()[0].name(), ANALYZE_TOOL_NAME);
        assert_eq!(msgs[3].role, Role::Tool);
        assert_eq!(msgs[3].tool_name.as_deref(), Some(ANALYZE_TOOL_NAME));
        assert!(msgs[3]
            .content
            .contains("- The Vendor shall indemnify the Client against all claims."));
        assert_eq!(msgs[4].content, "The indemnity clause is one-sided.");

        // The re-invocation saw the tool result
        let second = &gateway.requests.lock().unwrap()[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[3].role, Role::Tool);
    }

    #[tokio::test]
    async fn test_text_before_tool_call_is_emitted_first() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![text("Let me check."), tool(ANALYZE_TOOL_NAME), done()]),
            Ok(vec![text("Found one risky clause."), done()]),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        orch.run_turn(&mut history, "risks?", &mut sink).await.unwrap();

        assert_eq!(sink.frames, vec!["Let me check.", "Found one risky clause."]);
        let roles: Vec<Role> = history.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Assistant,
                Role::Tool,
                Role::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_recorded_but_unanswered() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool("fetch_weather"), done()]),
            Ok(vec![text("I can only analyze the document."), done()]),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "weather?", &mut sink).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Completed { model_calls: 2 });
        let msgs = history.messages();
        assert_eq!(msgs[2].tool_calls.as_ref().unwrap()[0].name(), "fetch_weather");
        // No tool message answers the unknown call
        assert!(msgs.iter().all(|m| m.role != Role::Tool));
        assert_eq!(msgs.len(), 4);
    }

    #[tokio::test]
    async fn test_request_failure_notifies_client() {
        let gateway = ScriptedGateway::new(vec![Err(refused())]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "hi", &mut sink).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Aborted(TurnAbort::RequestFailed {
                after_tool_call: false
            })
        );
        assert_eq!(sink.frames, vec![LLM_UNREACHABLE.to_string()]);
        // The user message stays; nothing else was appended
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_request_failure_after_tool_call() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool(ANALYZE_TOOL_NAME), done()]),
            Err(refused()),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "risks?", &mut sink).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Aborted(TurnAbort::RequestFailed {
                after_tool_call: true
            })
        );
        assert_eq!(sink.frames, vec![LLM_UNREACHABLE_AFTER_TOOL.to_string()]);
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn test_decode_failure_aborts_silently() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![text("partial "), decode_error()])]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "hi", &mut sink).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Aborted(TurnAbort::StreamFailed {
                after_tool_call: false
            })
        );
        assert!(sink.frames.is_empty());
        assert_eq!(history.len(), 2, "partial reply must not be appended");
    }

    #[tokio::test]
    async fn test_decode_failure_after_tool_call_aborts_cycle() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool(ANALYZE_TOOL_NAME), done()]),
            Ok(vec![decode_error()]),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "risks?", &mut sink).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Aborted(TurnAbort::StreamFailed {
                after_tool_call: true
            })
        );
        assert_eq!(gateway.request_count(), 2);
        assert_eq!(history.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_history_survives_for_next_turn() {
        let gateway = ScriptedGateway::new(vec![
            Err(refused()),
            Ok(vec![text("Back online."), done()]),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        orch.run_turn(&mut history, "first", &mut sink).await.unwrap();
        let outcome = orch.run_turn(&mut history, "second", &mut sink).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Completed { model_calls: 1 });
        let second = &gateway.requests.lock().unwrap()[1];
        let users: Vec<&str> = second
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(users, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_round_limit() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool(ANALYZE_TOOL_NAME), done()]),
            Ok(vec![tool(ANALYZE_TOOL_NAME), done()]),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 1);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "loop", &mut sink).await.unwrap();

        assert_eq!(outcome, TurnOutcome::RoundLimitReached { model_calls: 2 });
        assert_eq!(gateway.request_count(), 2);
        assert_eq!(history.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_every_stream_closed() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![tool(ANALYZE_TOOL_NAME), done()]),
            Ok(vec![tool(ANALYZE_TOOL_NAME), done()]),
            Ok(vec![text("x"), decode_error()]),
        ]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        orch.run_turn(&mut history, "go", &mut sink).await.unwrap();

        assert_eq!(gateway.opened.load(Ordering::SeqCst), 3);
        assert_eq!(gateway.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stream_without_done_still_completes() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![text("cut short")])]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "hi", &mut sink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed { model_calls: 1 });
        assert_eq!(sink.frames, vec!["cut short".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_reply_not_emitted() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![done()])]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink::default();

        let outcome = orch.run_turn(&mut history, "hi", &mut sink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed { model_calls: 1 });
        assert!(sink.frames.is_empty());
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_client_write_failure_is_error() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![text("hello"), done()])]);
        let doc = Document::new(DOC);
        let orch = Orchestrator::new(&gateway, "m", &doc, 10);
        let mut history = fresh_history();
        let mut sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };

        let result = orch.run_turn(&mut history, "hi", &mut sink).await;
        assert!(matches!(result, Err(AgentError::ClientDisconnected { .. })));
    }
}
