use anyhow::Context;

fn main() -> anyhow::Result<()> {
    notalawyer::init_tracing();

    let config = notalawyer::config::load_config().context("loading configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.model,
        endpoint = %config.ollama_endpoint,
        bind = %config.bind_addr,
        max_tool_rounds = config.max_tool_rounds,
        pid = std::process::id(),
        "=== NotALawyer starting ==="
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(notalawyer::server::serve(config))
}
