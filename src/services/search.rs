use crate::{
    db::FavoritesStore,
    error::AppResult,
    models::{GeoPoint, Item},
    services::providers::SearchProvider,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Service function for nearby item search
///
/// Delegates to the configured SearchProvider, maintaining a clean separation
/// between HTTP routing and business logic. A missing or blank term searches
/// everything near the location.
pub async fn search_nearby(
    provider: Arc<dyn SearchProvider>,
    lat: f64,
    lon: f64,
    term: Option<&str>,
) -> AppResult<Vec<Item>> {
    let location = GeoPoint::new(lat, lon)?;
    provider.search(location, term.unwrap_or_default().trim()).await
}

/// Ids the caller has favorited, used to mark search results
///
/// Anonymous callers and store failures yield an empty set; marking is
/// best-effort and never fails the search.
pub async fn favorited_ids(
    store: &dyn FavoritesStore,
    user_id: Option<&str>,
) -> HashSet<String> {
    let Some(user_id) = user_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return HashSet::new();
    };

    match store.favorited_item_ids(user_id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Favorites unavailable, results unmarked"
            );
            HashSet::new()
        }
    }
}
