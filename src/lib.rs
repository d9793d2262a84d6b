pub mod agent_core;
pub mod config;
pub mod inference;
pub mod server;
pub mod session;

/// Env var switching log output to JSON lines.
const ENV_LOG_FORMAT: &str = "NOTALAWYER_LOG_FORMAT";

/// Initialize the tracing subscriber, writing to stdout.
///
/// `RUST_LOG` overrides the default filter. Set `NOTALAWYER_LOG_FORMAT=json`
/// for one JSON object per line (for log shippers); anything else gives the
/// human-readable format.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notalawyer=info,warn"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    if json {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}
