//! Server configuration loading and validation.
//!
//! Configuration is resolved once in `main` and passed down explicitly.
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. An optional YAML file named by `NOTALAWYER_CONFIG`, with `${VAR}` and
//!    `${VAR:-default}` interpolation
//! 3. Individual environment variables (`OLLAMA_MODEL`, `OLLAMA_ENDPOINT`, …)

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

// ─── Constants ───────────────────────────────────────────────────────────────

pub const DEFAULT_MODEL: &str = "gpt-oss:20b";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_TOOL_ROUNDS: u32 = 10;
const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 300;

const ENV_CONFIG_FILE: &str = "NOTALAWYER_CONFIG";
const ENV_MODEL: &str = "OLLAMA_MODEL";
const ENV_ENDPOINT: &str = "OLLAMA_ENDPOINT";
const ENV_BIND: &str = "NOTALAWYER_BIND";
const ENV_MAX_TOOL_ROUNDS: &str = "NOTALAWYER_MAX_TOOL_ROUNDS";
const ENV_STREAM_TIMEOUT: &str = "NOTALAWYER_STREAM_TIMEOUT_SECS";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised while resolving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

// ─── ServerConfig ────────────────────────────────────────────────────────────

/// Process-wide settings. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ollama model tag used for every request, e.g. `gpt-oss:20b`.
    pub model: String,
    /// Ollama base address, e.g. `http://localhost:11434`.
    pub ollama_endpoint: String,
    /// Address the HTTP/WebSocket server listens on.
    pub bind_addr: SocketAddr,
    /// Upper bound on tool-call round trips within one user turn.
    pub max_tool_rounds: u32,
    /// Total timeout for one streamed chat response.
    pub stream_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            ollama_endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            stream_timeout_secs: DEFAULT_STREAM_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// `POST` target for streamed chats.
    pub fn chat_url(&self) -> String {
        self.endpoint_path("api/chat")
    }

    /// `POST` target for model metadata.
    pub fn show_url(&self) -> String {
        self.endpoint_path("api/show")
    }

    /// `GET` target used as a liveness probe.
    pub fn tags_url(&self) -> String {
        self.endpoint_path("api/tags")
    }

    fn endpoint_path(&self, path: &str) -> String {
        format!("{}/{path}", self.ollama_endpoint.trim_end_matches('/'))
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Resolve the configuration from the process environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
    load_config_with(|key| std::env::var(key).ok())
}

/// Resolve the configuration using `lookup` for every environment read.
pub fn load_config_with<F>(lookup: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match non_empty(&lookup, ENV_CONFIG_FILE) {
        Some(path) => load_config_file(Path::new(&path), &lookup)?,
        None => ServerConfig::default(),
    };

    if let Some(model) = non_empty(&lookup, ENV_MODEL) {
        config.model = model;
    }
    if let Some(endpoint) = non_empty(&lookup, ENV_ENDPOINT) {
        config.ollama_endpoint = endpoint;
    }
    if let Some(bind) = non_empty(&lookup, ENV_BIND) {
        config.bind_addr = parse_value(ENV_BIND, &bind)?;
    }
    if let Some(rounds) = non_empty(&lookup, ENV_MAX_TOOL_ROUNDS) {
        config.max_tool_rounds = parse_value(ENV_MAX_TOOL_ROUNDS, &rounds)?;
    }
    if let Some(secs) = non_empty(&lookup, ENV_STREAM_TIMEOUT) {
        config.stream_timeout_secs = parse_value(ENV_STREAM_TIMEOUT, &secs)?;
    }

    validate(&config)?;
    Ok(config)
}

/// Load and parse a YAML configuration file.
///
/// Missing keys fall back to the defaults.
pub fn load_config_file<F>(path: &Path, lookup: &F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let interpolated = interpolate_env_vars(&raw, lookup);

    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseFailed {
        reason: e.to_string(),
    })
}

fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.model.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "model".into(),
            value: config.model.clone(),
            reason: "must not be empty".into(),
        });
    }
    if !config.ollama_endpoint.starts_with("http://")
        && !config.ollama_endpoint.starts_with("https://")
    {
        return Err(ConfigError::InvalidValue {
            key: "ollama_endpoint".into(),
            value: config.ollama_endpoint.clone(),
            reason: "must be an http(s) URL".into(),
        });
    }
    if config.stream_timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "stream_timeout_secs".into(),
            value: "0".into(),
            reason: "must be positive".into(),
        });
    }
    Ok(())
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr, lookup));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr<F>(expr: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match expr.split_once(":-") {
        Some((var_name, default)) => lookup(var_name).unwrap_or_else(|| default.to_string()),
        None => lookup(expr).unwrap_or_default(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
