use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use rag_service::core;
use rag_service::server;
use rag_service::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (paths, config_service, config) = AppState::load_config()?;

    let log_dir = config
        .logging
        .dir
        .clone()
        .unwrap_or_else(|| paths.log_dir.clone());
    core::logging::init(&log_dir);

    let state = AppState::initialize(paths, config_service, config)?;

    tracing::info!(
        "Loaded configuration from {}: {}",
        state.config_service.config_path().display(),
        state.config_service.redact_sensitive_values(&state.config)
    );

    // Open the store in the background; request handlers share the same
    // initialization and retry it if this attempt fails.
    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(err) = store.get().await {
            tracing::warn!("Vector store not ready yet: {}", err);
        }
    });

    let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        "Listening on {} (generator={}, logs={})",
        addr,
        state.pipeline.generator_name(),
        log_dir.display()
    );

    let app: Router = server::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
