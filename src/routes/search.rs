use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{error::AppResult, models::ItemResponse, routes::AppState, services::search};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    lat: f64,
    lon: f64,
    term: Option<String>,
    /// Marks results this user has favorited
    user_id: Option<String>,
}

/// Handler for nearby search endpoint
pub async fn search(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ItemResponse>>> {
    let Query(params) = params?;
    let items = search::search_nearby(
        Arc::clone(&state.provider),
        params.lat,
        params.lon,
        params.term.as_deref(),
    )
    .await?;

    let favorited = search::favorited_ids(state.store.as_ref(), params.user_id.as_deref()).await;
    Ok(Json(ItemResponse::mark_all(items, &favorited)))
}
