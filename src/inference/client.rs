//! Ollama inference client.
//!
//! Sends chat requests to the local Ollama endpoint and streams back message
//! fragments. Also answers the one metadata question the bridge asks: how
//! large is the model's context window.

use std::future::Future;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use reqwest::Client as HttpClient;

use crate::config::ServerConfig;

use super::errors::InferenceError;
use super::streaming::parse_ndjson_stream;
use super::types::{
    ChatMessage, ChatRequest, ShowRequest, ShowResponse, StreamFragment, ToolDefinition,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for the metadata and health requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Key suffix Ollama uses for the context size in `model_info`
/// (e.g. `gptoss.context_length`, `llama.context_length`).
const CONTEXT_LENGTH_SUFFIX: &str = ".context_length";

/// A streamed chat response. Dropping it closes the underlying HTTP body.
pub type FragmentStream = BoxStream<'static, Result<StreamFragment, InferenceError>>;

// ─── ModelGateway ────────────────────────────────────────────────────────────

/// The two questions the orchestrator and session loop ask of the model server.
///
/// `OllamaClient` is the production implementation; tests script their own.
pub trait ModelGateway: Send + Sync {
    /// Context window size of `model`, or 0 when unknown.
    ///
    /// Never fails: lookup errors are logged and degrade to 0.
    fn context_length<'a>(&'a self, model: &'a str) -> impl Future<Output = u64> + Send + 'a;

    /// Open a streamed chat request.
    ///
    /// Errors returned here are request failures; errors yielded by the stream
    /// are decode or read failures.
    fn stream_chat<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> impl Future<Output = Result<FragmentStream, InferenceError>> + Send + 'a;
}

// ─── OllamaClient ────────────────────────────────────────────────────────────

/// Client for the local Ollama HTTP API.
///
/// Cheap to share: one instance serves every session behind an `Arc`.
pub struct OllamaClient {
    /// HTTP client for metadata requests (30s timeout).
    http: HttpClient,
    /// HTTP client for streaming chat requests (configurable timeout).
    http_stream: HttpClient,
    chat_url: String,
    show_url: String,
    tags_url: String,
}

impl OllamaClient {
    /// Build a client from the server configuration.
    ///
    /// Does NOT check connectivity. That happens on the first request.
    pub fn from_config(config: &ServerConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.ollama_endpoint.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_stream = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.stream_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.ollama_endpoint.clone(),
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            http_stream,
            chat_url: config.chat_url(),
            show_url: config.show_url(),
            tags_url: config.tags_url(),
        })
    }

    /// The chat endpoint this client posts to.
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    // ─── Metadata ────────────────────────────────────────────────────────

    /// Query `/api/show` and pull the context length out of `model_info`.
    pub async fn fetch_context_length(&self, model: &str) -> Result<Option<u64>, InferenceError> {
        let response = self
            .http
            .post(&self.show_url)
            .json(&ShowRequest { model })
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(&self.show_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::from_reqwest(&self.show_url, e))?;
        let show: ShowResponse =
            serde_json::from_str(&body).map_err(|e| InferenceError::DecodeError {
                line: body.clone(),
                reason: e.to_string(),
            })?;

        Ok(context_length_from_show(&show))
    }

    // ─── Health Check ────────────────────────────────────────────────────

    /// Check if the Ollama endpoint is reachable.
    ///
    /// Lists local models via `/api/tags`, which does not load a model.
    pub async fn health_check(&self) -> bool {
        match self.http.get(&self.tags_url).timeout(CONNECT_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %self.tags_url, error = %e, "ollama health check failed");
                false
            }
        }
    }

    // ─── Chat (streaming) ────────────────────────────────────────────────

    async fn open_chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<FragmentStream, InferenceError> {
        let body = ChatRequest {
            model,
            messages,
            stream: true,
            tools,
        };

        // Log the request metadata (not the full body, it embeds the document)
        tracing::info!(
            url = %self.chat_url,
            model = %model,
            message_count = messages.len(),
            tool_count = tools.len(),
            "=== LLM REQUEST ==="
        );

        let response = self
            .http_stream
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(&self.chat_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(parse_ndjson_stream(response.bytes_stream()).boxed())
    }
}

impl ModelGateway for OllamaClient {
    fn context_length<'a>(&'a self, model: &'a str) -> impl Future<Output = u64> + Send + 'a {
        async move {
            match self.fetch_context_length(model).await {
                Ok(Some(length)) => length,
                Ok(None) => {
                    tracing::warn!(model = %model, "no context_length found in model_info");
                    0
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "error contacting ollama /api/show");
                    0
                }
            }
        }
    }

    fn stream_chat<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> impl Future<Output = Result<FragmentStream, InferenceError>> + Send + 'a {
        self.open_chat_stream(model, messages, tools)
    }
}

/// First numeric `*.context_length` entry in `model_info`, if any.
fn context_length_from_show(show: &ShowResponse) -> Option<u64> {
    let model_info = show.model_info.as_ref()?;
    model_info
        .iter()
        .filter(|(key, _)| key.ends_with(CONTEXT_LENGTH_SUFFIX))
        .find_map(|(_, value)| value.as_u64().or_else(|| value.as_f64().map(|f| f as u64)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
