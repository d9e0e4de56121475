use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::AppConfig,
    error::GlineError,
    model::{Entity, ExtractRequest, ModelMetadata, ModelRegistry},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
}

#[derive(Serialize)]
struct MetadataResponse {
    model: ModelMetadata,
    ready: bool,
    request_timeout_secs: u64,
}

pub fn build_router(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> Router {
    let state = AppState { registry, config };

    Router::new()
        .route("/health", get(health))
        .route("/metadata", get(metadata))
        .route("/extract", post(extract))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    Json(MetadataResponse {
        model: state.registry.metadata(),
        ready: state.registry.is_ready(),
        request_timeout_secs: state.config.request_timeout.as_secs(),
    })
}

async fn extract(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<Vec<Entity>>, GlineError> {
    info!(labels = request.labels.len(), "extract request");
    let entities = state.registry.extract_entities(request).await?;
    Ok(Json(entities))
}
