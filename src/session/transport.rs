//! Client transport: the duplex text channel a session talks over.
//!
//! The session loop is written against [`ClientTransport`] so it can run over
//! an axum WebSocket in production and over in-memory channels in tests.

use std::future::Future;

use axum::extract::ws::{Message, WebSocket};

use crate::agent_core::errors::AgentError;
use crate::agent_core::orchestrator::ReplySink;

use super::errors::SessionError;

/// A duplex connection carrying whole text frames.
pub trait ClientTransport: Send {
    /// Next inbound text frame.
    ///
    /// `None` means the client closed the connection.
    fn recv_frame(&mut self) -> impl Future<Output = Option<Result<String, SessionError>>> + Send;

    /// Send one outbound text frame.
    fn send_frame(&mut self, text: String) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Best-effort close. Errors are ignored: the peer may already be gone.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

impl<T: ClientTransport> ReplySink for T {
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), AgentError>> + Send {
        async move {
            self.send_frame(text)
                .await
                .map_err(|e| AgentError::ClientDisconnected {
                    reason: e.to_string(),
                })
        }
    }
}

// ─── WebSocket adapter ──────────────────────────────────────────────────────

/// [`ClientTransport`] over an upgraded axum WebSocket.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl ClientTransport for WsTransport {
    fn recv_frame(&mut self) -> impl Future<Output = Option<Result<String, SessionError>>> + Send {
        async move {
            loop {
                let message = match self.socket.recv().await? {
                    Ok(message) => message,
                    Err(e) => {
                        return Some(Err(SessionError::ReceiveFailed {
                            reason: e.to_string(),
                        }))
                    }
                };
                match message {
                    Message::Text(text) => return Some(Ok(text)),
                    Message::Binary(bytes) => {
                        return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    // Pongs are queued by the WebSocket itself
                    Message::Ping(_) | Message::Pong(_) => continue,
                    Message::Close(frame) => {
                        tracing::debug!(frame = ?frame, "client sent close frame");
                        return None;
                    }
                }
            }
        }
    }

    fn send_frame(&mut self, text: String) -> impl Future<Output = Result<(), SessionError>> + Send {
        async move {
            self.socket
                .send(Message::Text(text))
                .await
                .map_err(|e| SessionError::SendFailed {
                    reason: e.to_string(),
                })
        }
    }

    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async move {
            if let Err(e) = self.socket.send(Message::Close(None)).await {
                tracing::debug!(error = %e, "close frame not delivered");
            }
        }
    }
}
