use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{
    file_search::gemini::GeminiFileSearch,
    storage::store::StorageManager,
    utils::config::get_config,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    if config.gemini_api_key.is_none() {
        warn!("gemini_api_key is not set; uploads and searches will fail until it is configured");
    }

    let storage = StorageManager::new(&config).await?;
    info!(backend = ?storage.backend_kind(), "Object storage initialized");

    let file_search = Arc::new(GeminiFileSearch::from_config(&config)?);
    let api_state = ApiState::new(&config, storage, file_search).await?;

    let app = build_app(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn build_app(api_state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
