use axum::{
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::FavoritesStore,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{RecommendOptions, RecommendationEngine, SearchProvider},
};

pub mod history;
pub mod recommendations;
pub mod search;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn FavoritesStore>,
    pub provider: Arc<dyn SearchProvider>,
    pub engine: RecommendationEngine,
}

impl AppState {
    /// Wires the engine to the same store and provider the handlers use
    pub fn new(
        store: Arc<dyn FavoritesStore>,
        provider: Arc<dyn SearchProvider>,
        options: RecommendOptions,
    ) -> Self {
        let engine = RecommendationEngine::new(Arc::clone(&store), Arc::clone(&provider), options);
        Self {
            store,
            provider,
            engine,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/history",
            get(history::list).post(history::add).delete(history::remove),
        )
        .route("/recommendation", get(recommendations::recommend))
        .route("/search", get(search::search))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
