//! Local front-end for an Ollama daemon: supervises `ollama serve`, relays
//! streaming chat to a browser UI, lists models and installs uploaded ones.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod config;
pub mod daemon;
pub mod error;
pub mod relay;
pub mod routes;
pub mod staging;

#[cfg(test)]
mod test_support;

use daemon::{ModelCreator, OllamaClient};

/// Shared per-request context. Read-only; the daemon process handle is not
/// part of it.
#[derive(Clone)]
pub struct AppState {
    pub ollama: OllamaClient,
    pub creator: Arc<dyn ModelCreator>,
    pub staging_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(ollama: OllamaClient, creator: Arc<dyn ModelCreator>, staging_dir: PathBuf) -> Self {
        Self {
            ollama,
            creator,
            staging_dir: Arc::new(staging_dir),
        }
    }
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/ask", post(routes::ask))
        .route("/models", get(routes::list_models))
        .route(
            "/create-model",
            post(routes::create_model).layer(DefaultBodyLimit::max(routes::MAX_UPLOAD_BYTES)),
        )
        .route("/debug", get(routes::debug_report))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
