use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult, middleware::request_id::RequestId, models::ItemResponse, routes::AppState,
};

/// Response header set when the recommendation is partial
pub const DEGRADED_HEADER: &str = "x-recommendation-degraded";

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub user_id: String,
    pub lat: f64,
    pub lon: f64,
}

/// Handler for recommendations endpoint
///
/// Always answers with a JSON array; store outages and failed keyword searches
/// only shrink it and set the degraded header.
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    params: Result<Query<RecommendationQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    tracing::info!(
        request_id = %request_id,
        user_id = %params.user_id,
        "Processing recommendation request"
    );

    let recommendation = state
        .engine
        .recommend(&params.user_id, params.lat, params.lon)
        .await?;

    let degraded = recommendation.is_degraded();
    if degraded {
        tracing::warn!(
            request_id = %request_id,
            store_unavailable = recommendation.store_unavailable,
            timed_out = recommendation.timed_out,
            failed_terms = ?recommendation
                .failures
                .iter()
                .map(|f| f.keyword.as_str())
                .collect::<Vec<_>>(),
            "Returning degraded recommendation"
        );
    }

    let items = ItemResponse::mark_all(recommendation.items, &recommendation.favorited);
    let mut response = Json(items).into_response();
    if degraded {
        response
            .headers_mut()
            .insert(DEGRADED_HEADER, HeaderValue::from_static("true"));
    }

    Ok(response)
}
