use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::instrument;

use crate::{
    db::FavoritesStore,
    error::{AppError, AppResult},
    models::{validate_user_id, GeoPoint, Item},
    services::{providers::SearchProvider, ranking::KeywordProfile},
};

/// Number of most frequent keywords searched per recommendation
pub const TOP_TERMS: usize = 3;

/// Hard ceiling on concurrent provider calls per recommendation
pub const MAX_FAN_OUT: usize = TOP_TERMS;

/// Tuning for the recommendation engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendOptions {
    /// Drop repeated item ids across keyword results, keeping the first
    pub dedupe: bool,
    /// Drop items the user has already favorited
    pub exclude_favorited: bool,
    /// Budget for the whole search fan-out
    pub deadline: Duration,
    /// Upper bound on concurrent provider calls, capped at `MAX_FAN_OUT`
    pub max_concurrency: usize,
    /// Extra attempts per keyword after a failed search
    pub retries: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            dedupe: true,
            exclude_favorited: false,
            deadline: Duration::from_secs(5),
            max_concurrency: 3,
            retries: 0,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// A keyword whose search contributed nothing to the result
#[derive(Debug, Clone, PartialEq)]
pub struct PartialFailure {
    pub rank: usize,
    pub keyword: String,
    pub reason: String,
}

/// Outcome of one recommendation request
#[derive(Debug, Default, Clone)]
pub struct Recommendation {
    /// Merged items in keyword-rank order
    pub items: Vec<Item>,
    /// Search terms in rank order
    pub terms: Vec<String>,
    pub failures: Vec<PartialFailure>,
    /// Item ids the user had favorited when the profile was built
    pub favorited: HashSet<String>,
    /// The store could not supply (all of) the keyword profile
    pub store_unavailable: bool,
    /// The fan-out deadline passed before every search finished
    pub timed_out: bool,
}

impl Recommendation {
    /// True when the items may be incomplete
    pub fn is_degraded(&self) -> bool {
        self.store_unavailable || self.timed_out || !self.failures.is_empty()
    }
}

/// Keyword profile plus the favorites it was built from
struct ProfileLoad {
    profile: KeywordProfile,
    favorited: HashSet<String>,
    store_unavailable: bool,
}

/// Recommends fresh items from the keywords of a user's favorites
///
/// 1. Count keywords across the user's favorited items
/// 2. Take the most frequent terms (ties by keyword text)
/// 3. Search each term concurrently near the caller
/// 4. Merge results in term-rank order
///
/// Store and per-keyword provider failures degrade the result instead of
/// failing the call; only invalid input is returned as an error.
pub struct RecommendationEngine {
    store: Arc<dyn FavoritesStore>,
    provider: Arc<dyn SearchProvider>,
    options: RecommendOptions,
}

impl RecommendationEngine {
    pub fn new(
        store: Arc<dyn FavoritesStore>,
        provider: Arc<dyn SearchProvider>,
        options: RecommendOptions,
    ) -> Self {
        Self {
            store,
            provider,
            options,
        }
    }

    /// Recommends items for `user_id` near (`lat`, `lon`)
    #[instrument(skip(self))]
    pub async fn recommend(&self, user_id: &str, lat: f64, lon: f64) -> AppResult<Recommendation> {
        validate_user_id(user_id)?;
        let location = GeoPoint::new(lat, lon)?;

        let load = self.load_profile(user_id).await;
        let terms = load.profile.top_terms(TOP_TERMS);

        tracing::info!(
            favorites = load.favorited.len(),
            distinct_keywords = load.profile.len(),
            terms = ?terms,
            "Keyword profile built"
        );

        let mut recommendation = Recommendation {
            store_unavailable: load.store_unavailable,
            ..Default::default()
        };

        if terms.is_empty() {
            recommendation.favorited = load.favorited;
            return Ok(recommendation);
        }

        let (per_term, failures, timed_out) = self.search_terms(location, &terms).await;

        let exclude = self.options.exclude_favorited.then_some(&load.favorited);
        recommendation.items = merge_results(per_term, self.options.dedupe, exclude);
        recommendation.favorited = load.favorited;
        recommendation.terms = terms;
        recommendation.failures = failures;
        recommendation.timed_out = timed_out;

        tracing::info!(
            items = recommendation.items.len(),
            failed_terms = recommendation.failures.len(),
            timed_out = recommendation.timed_out,
            "Recommendation completed"
        );

        Ok(recommendation)
    }

    /// Builds the keyword profile, degrading to empty on store failure
    ///
    /// Only connectivity failures mark the load as `store_unavailable`;
    /// other store errors are logged and leave the flag unset.
    async fn load_profile(&self, user_id: &str) -> ProfileLoad {
        let mut load = ProfileLoad {
            profile: KeywordProfile::new(),
            favorited: HashSet::new(),
            store_unavailable: false,
        };

        load.favorited = match self.store.favorited_item_ids(user_id).await {
            Ok(ids) => ids,
            Err(e) if e.is_store_unavailable() => {
                tracing::warn!(error = %e, "Favorites unavailable, recommending nothing");
                load.store_unavailable = true;
                return load;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read favorites, recommending nothing");
                return load;
            }
        };

        for item_id in &load.favorited {
            match self.store.keywords_of(item_id).await {
                Ok(keywords) => load.profile.add_item_keywords(&keywords),
                Err(e) if e.is_store_unavailable() => {
                    tracing::warn!(
                        item_id = %item_id,
                        error = %e,
                        "Keywords unavailable for favorited item"
                    );
                    load.store_unavailable = true;
                }
                Err(e) => {
                    tracing::error!(
                        item_id = %item_id,
                        error = %e,
                        "Failed to read keywords for favorited item"
                    );
                }
            }
        }

        load
    }

    /// Searches every term concurrently under the configured deadline
    ///
    /// Returns one item list per term in rank order (empty for failed or
    /// unfinished terms), the failures, and whether the deadline passed.
    async fn search_terms(
        &self,
        location: GeoPoint,
        terms: &[String],
    ) -> (Vec<Vec<Item>>, Vec<PartialFailure>, bool) {
        let permits = self
            .options
            .max_concurrency
            .clamp(1, terms.len().clamp(1, MAX_FAN_OUT));
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for (rank, keyword) in terms.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let keyword = keyword.clone();
            let retries = self.options.retries;
            let backoff = self.options.retry_backoff;

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        search_with_retry(provider.as_ref(), location, &keyword, retries, backoff)
                            .await
                    }
                    Err(e) => Err(AppError::Internal(e.to_string())),
                };
                (rank, result)
            });
        }

        // Slots are indexed by rank so completion order never leaks into output
        let mut slots: Vec<Option<AppResult<Vec<Item>>>> = terms.iter().map(|_| None).collect();
        // A deadline too far out to represent means no deadline
        let deadline = Instant::now().checked_add(self.options.deadline);
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, tasks.join_next()).await,
                None => Ok(tasks.join_next().await),
            };

            match next {
                Ok(Some(Ok((rank, result)))) => slots[rank] = Some(result),
                Ok(Some(Err(e))) => {
                    tracing::error!(error = %e, "Search task join error");
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        let mut per_term = Vec::with_capacity(terms.len());
        let mut failures = Vec::new();

        for (rank, (keyword, slot)) in terms.iter().zip(slots).enumerate() {
            let reason = match slot {
                Some(Ok(items)) => {
                    per_term.push(items);
                    continue;
                }
                Some(Err(AppError::ProviderCallFailed { reason, .. })) => reason,
                Some(Err(e)) => e.to_string(),
                None if timed_out => "search did not finish before the deadline".to_string(),
                None => "search task failed".to_string(),
            };

            tracing::error!(rank, keyword = %keyword, reason = %reason, "Keyword search failed");
            per_term.push(Vec::new());
            failures.push(PartialFailure {
                rank,
                keyword: keyword.clone(),
                reason,
            });
        }

        if !failures.is_empty() {
            tracing::warn!(
                success_count = terms.len() - failures.len(),
                error_count = failures.len(),
                "Partial recommendation search failure"
            );
        }

        (per_term, failures, timed_out)
    }
}

/// Runs one keyword search, retrying failures up to `retries` times
///
/// Invalid input is returned as-is; any other final failure becomes
/// `ProviderCallFailed`.
async fn search_with_retry(
    provider: &dyn SearchProvider,
    location: GeoPoint,
    keyword: &str,
    retries: u32,
    backoff: Duration,
) -> AppResult<Vec<Item>> {
    let mut attempt: u32 = 0;

    loop {
        match provider.search(location, keyword).await {
            Ok(items) => return Ok(items),
            Err(e @ AppError::InvalidInput(_)) => return Err(e),
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(
                    keyword = %keyword,
                    attempt,
                    error = %e,
                    "Search failed, retrying"
                );
                tokio::time::sleep(retry_delay(backoff, attempt)).await;
            }
            Err(e) => {
                return Err(AppError::ProviderCallFailed {
                    keyword: keyword.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Linear backoff before retry number `attempt`, saturating at `Duration::MAX`
fn retry_delay(backoff: Duration, attempt: u32) -> Duration {
    backoff.saturating_mul(attempt)
}

/// Concatenates per-term results in rank order
///
/// With `dedupe` an item id is kept only at its first occurrence. Items whose
/// id is in `exclude` are dropped.
pub fn merge_results(
    per_term: Vec<Vec<Item>>,
    dedupe: bool,
    exclude: Option<&HashSet<String>>,
) -> Vec<Item> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for item in per_term.into_iter().flatten() {
        if exclude.is_some_and(|ids| ids.contains(&item.item_id)) {
            continue;
        }
        if dedupe && !seen.insert(item.item_id.clone()) {
            continue;
        }
        merged.push(item);
    }

    merged
}
