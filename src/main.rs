use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ollama_relay::config::Config;
use ollama_relay::daemon::{DaemonProcess, OllamaCli, OllamaClient, shutdown_signal};
use ollama_relay::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ollama_relay=info,tower_http=info")),
        )
        .init();

    let config = Config::parse();
    let ollama = OllamaClient::new(config.ollama_url.clone());

    // Nothing is served until the daemon answers.
    let daemon = if config.external_daemon {
        DaemonProcess::attach(&ollama).await?
    } else {
        DaemonProcess::start(&config.ollama_bin, &ollama, config.startup_delay()).await?
    };

    let staging_dir = config
        .staging_dir()
        .context("Failed to resolve staging directory")?;
    let state = AppState::new(
        ollama,
        Arc::new(OllamaCli::new(config.ollama_bin.clone())),
        staging_dir,
    );
    let app = router(state, &config.static_dir);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Ollama relay starting on http://{}", addr);
    tracing::info!("Available endpoints:");
    tracing::info!("  - GET  /              - Chat UI ({})", config.static_dir.display());
    tracing::info!("  - POST /ask           - Streaming chat");
    tracing::info!("  - GET  /models        - Installed models");
    tracing::info!("  - POST /create-model  - Install a model from an upload");
    tracing::info!("  - GET  /debug         - Daemon diagnostics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(daemon))
        .await
        .context("Server failed")?;

    Ok(())
}
