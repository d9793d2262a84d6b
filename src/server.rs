//! HTTP surface: the WebSocket endpoint and a health probe.
//!
//! Every WebSocket upgrade becomes one session task. Sessions share only the
//! read-only [`AppState`].

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::inference::client::OllamaClient;
use crate::session::{run_session, WsTransport};

/// WebSocket path the web client connects to.
pub const DOC_ANALYSIS_PATH: &str = "/api/v1/doc-analysis";

pub const HEALTH_PATH: &str = "/api/v1/health";

/// Shared, immutable state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<OllamaClient>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(gateway: OllamaClient, config: ServerConfig) -> Self {
        Self {
            gateway: Arc::new(gateway),
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    inference_reachable: bool,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(DOC_ANALYSIS_PATH, get(doc_analysis))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

async fn doc_analysis(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_failed_upgrade(|e| {
        tracing::debug!(error = %e, "websocket upgrade failed");
    })
    .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("session", session_id = %session_id);

    async move {
        tracing::info!("client connected");
        let end = run_session(
            state.gateway.as_ref(),
            &state.config,
            WsTransport::new(socket),
        )
        .await;
        tracing::info!(end = ?end, "session ended");
    }
    .instrument(span)
    .await
}

/// The bridge itself is always "ok" when it answers; upstream reachability
/// is reported separately.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let inference_reachable = state.gateway.health_check().await;
    Json(HealthResponse {
        status: "ok",
        model: state.config.model.clone(),
        inference_reachable,
    })
}

/// Bind to `config.bind_addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let gateway = OllamaClient::from_config(&config)?;
    let bind_addr = config.bind_addr;
    let app = build_router(AppState::new(gateway, config));

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
