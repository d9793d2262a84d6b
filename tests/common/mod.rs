//! Mock Ollama server shared by the integration tests.
//!
//! `/api/chat` behaviour is keyed on the last message:
//! - a tool result ⇒ a two-fragment summary reply
//! - a user message mentioning "risk" ⇒ an `analyze_document_sentiments` call
//! - `fail` ⇒ HTTP 500
//! - `garbage` ⇒ a non-JSON line
//! - anything else ⇒ `You said: <text>`

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use notalawyer::config::ServerConfig;

pub const CONTEXT_LENGTH: u64 = 131072;
pub const TOOL_SUMMARY: &str = "The indemnity clause favours the Vendor.";

#[derive(Clone, Default)]
pub struct MockOllama {
    pub chat_requests: Arc<Mutex<Vec<Value>>>,
}

impl MockOllama {
    pub fn chat_requests(&self) -> Vec<Value> {
        self.chat_requests.lock().unwrap().clone()
    }
}

/// Start the mock on an ephemeral port.
pub async fn spawn_mock_ollama() -> (SocketAddr, MockOllama) {
    let mock = MockOllama::default();
    let app = Router::new()
        .route("/api/show", post(show))
        .route("/api/chat", post(chat))
        .route("/api/tags", get(tags))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

/// Config pointing at the mock.
pub fn config_for(addr: SocketAddr) -> ServerConfig {
    ServerConfig {
        ollama_endpoint: format!("http://{addr}/"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        stream_timeout_secs: 10,
        ..ServerConfig::default()
    }
}

async fn show(Json(body): Json<Value>) -> Response {
    match body["model"].as_str().unwrap_or("") {
        "missing" => (StatusCode::NOT_FOUND, "model not found").into_response(),
        "no-info" => Json(json!({ "license": "MIT" })).into_response(),
        _ => Json(json!({
            "model_info": {
                "general.architecture": "gptoss",
                "gptoss.context_length": CONTEXT_LENGTH,
            }
        }))
        .into_response(),
    }
}

async fn tags() -> Json<Value> {
    Json(json!({ "models": [{ "name": "gpt-oss:20b" }] }))
}

async fn chat(State(mock): State<MockOllama>, Json(body): Json<Value>) -> Response {
    mock.chat_requests.lock().unwrap().push(body.clone());

    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .cloned()
        .unwrap_or(Value::Null);
    let role = last["role"].as_str().unwrap_or("");
    let content = last["content"].as_str().unwrap_or("");

    let lines: Vec<Value> = if role == "tool" {
        vec![
            fragment("The indemnity clause "),
            fragment("favours the Vendor."),
            done(),
        ]
    } else if content == "fail" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    } else if content == "garbage" {
        return ndjson("not json at all\n".to_string());
    } else if content.contains("risk") {
        vec![
            json!({
                "model": "gpt-oss:20b",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "function": { "name": "analyze_document_sentiments", "arguments": {} }
                    }]
                },
                "done": false
            }),
            done(),
        ]
    } else {
        vec![fragment("You said: "), fragment(content), done()]
    };

    let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
    ndjson(body)
}

fn fragment(text: &str) -> Value {
    json!({
        "model": "gpt-oss:20b",
        "message": { "role": "assistant", "content": text },
        "done": false
    })
}

fn done() -> Value {
    json!({ "model": "gpt-oss:20b", "message": { "role": "assistant", "content": "" }, "done": true })
}

fn ndjson(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}
