use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{
        validate_user_id, AddFavoriteRequest, Item, ItemResponse, RemoveFavoriteRequest,
        WriteResult,
    },
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: String,
}

/// Handler listing a user's favorited items, sorted by id
pub async fn list(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ItemResponse>>> {
    let Query(params) = params?;
    validate_user_id(&params.user_id)?;

    let mut items: Vec<Item> = state
        .store
        .favorited_items(&params.user_id)
        .await?
        .into_iter()
        .collect();
    items.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    Ok(Json(
        items
            .into_iter()
            .map(|item| ItemResponse::new(item, true))
            .collect(),
    ))
}

/// Handler for favoriting an item
pub async fn add(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    request: Result<Json<AddFavoriteRequest>, JsonRejection>,
) -> AppResult<Json<WriteResult>> {
    let Json(request) = request?;
    validate_user_id(&request.user_id)?;
    if request.favorite.item_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Favorite item_id cannot be empty".to_string(),
        ));
    }

    state
        .store
        .add_favorite(&request.user_id, &request.favorite)
        .await?;

    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        item_id = %request.favorite.item_id,
        keywords = request.favorite.keywords.len(),
        "Favorite added"
    );

    Ok(Json(WriteResult::success()))
}

/// Handler for unfavoriting an item
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    request: Result<Json<RemoveFavoriteRequest>, JsonRejection>,
) -> AppResult<Json<WriteResult>> {
    let Json(request) = request?;
    validate_user_id(&request.user_id)?;

    state
        .store
        .remove_favorite(&request.user_id, &request.favorite.item_id)
        .await?;

    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        item_id = %request.favorite.item_id,
        "Favorite removed"
    );

    Ok(Json(WriteResult::success()))
}
