/// Search provider abstraction
///
/// A provider answers one question: which catalog items near a location match a
/// keyword. Implementations make a single external call per `search` and never
/// retry; retry and fan-out belong to the recommendation engine.
use crate::{
    error::AppResult,
    models::{GeoPoint, Item},
};

pub mod job_board;

pub use job_board::JobBoardProvider;

/// Trait for geo-aware item search backends
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for items near `location` matching `keyword`
    ///
    /// An empty keyword means an unfiltered nearby search.
    async fn search(&self, location: GeoPoint, keyword: &str) -> AppResult<Vec<Item>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
