use std::collections::{BTreeSet, HashSet};

use crate::{error::AppResult, models::Item};

/// Persistence contract for favorites and item keywords
///
/// Every method returns `AppError::StoreUnavailable` when the backing storage
/// cannot be reached, so callers can tell an outage apart from "no data".
/// Reads of unknown users or items succeed with empty values.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FavoritesStore: Send + Sync {
    /// Saves `item` (ignored if the id already exists, keywords merged) and
    /// records the favorite. Re-favoriting may add a duplicate association.
    async fn add_favorite(&self, user_id: &str, item: &Item) -> AppResult<()>;

    /// Removes every association between the user and the item.
    /// The item row and its keywords are kept.
    async fn remove_favorite(&self, user_id: &str, item_id: &str) -> AppResult<()>;

    /// Deduplicated ids of the items the user currently has favorited
    async fn favorited_item_ids(&self, user_id: &str) -> AppResult<HashSet<String>>;

    /// Deduplicated keyword set for an item; empty if the item is unknown
    async fn keywords_of(&self, item_id: &str) -> AppResult<BTreeSet<String>>;

    /// Full item record including keywords
    async fn item(&self, item_id: &str) -> AppResult<Option<Item>>;

    /// Full records of the user's favorited items
    ///
    /// Ids present in the favorites association but missing from the item
    /// table are skipped.
    async fn favorited_items(&self, user_id: &str) -> AppResult<HashSet<Item>> {
        let ids = self.favorited_item_ids(user_id).await?;
        let mut items = HashSet::with_capacity(ids.len());

        for item_id in ids {
            match self.item(&item_id).await? {
                Some(item) => {
                    items.insert(item);
                }
                None => {
                    tracing::debug!(item_id = %item_id, "Favorited item missing from item table");
                }
            }
        }

        Ok(items)
    }

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
