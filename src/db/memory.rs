use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{db::FavoritesStore, error::AppResult, models::Item};

/// Scalar columns of an item row
#[derive(Debug, Clone)]
struct ItemRow {
    name: String,
    address: String,
    image_url: String,
    url: String,
}

/// Tables held by the in-memory store
#[derive(Default)]
struct MemoryInner {
    items: HashMap<String, ItemRow>,
    keywords: HashMap<String, BTreeSet<String>>,
    /// (user_id, item_id) rows; duplicates allowed like the SQL history table
    history: Vec<(String, String)>,
}

/// Process-local favorites store for development and tests
#[derive(Clone, Default)]
pub struct MemoryFavoritesStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryFavoritesStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw favorite rows for a user, duplicates included
    pub async fn history_len(&self, user_id: &str) -> usize {
        let inner = self.inner.read().await;
        inner.history.iter().filter(|(u, _)| u == user_id).count()
    }

    /// Number of stored item rows
    pub async fn item_count(&self) -> usize {
        self.inner.read().await.items.len()
    }
}

#[async_trait::async_trait]
impl FavoritesStore for MemoryFavoritesStore {
    async fn add_favorite(&self, user_id: &str, item: &Item) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        inner
            .items
            .entry(item.item_id.clone())
            .or_insert_with(|| ItemRow {
                name: item.name.clone(),
                address: item.address.clone(),
                image_url: item.image_url.clone(),
                url: item.url.clone(),
            });

        inner
            .keywords
            .entry(item.item_id.clone())
            .or_default()
            .extend(item.keywords.iter().cloned());

        inner
            .history
            .push((user_id.to_string(), item.item_id.clone()));

        Ok(())
    }

    async fn remove_favorite(&self, user_id: &str, item_id: &str) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .history
            .retain(|(u, i)| !(u == user_id && i == item_id));
        Ok(())
    }

    async fn favorited_item_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .history
            .iter()
            .filter(|(u, _)| u == user_id)
            .map(|(_, i)| i.clone())
            .collect())
    }

    async fn keywords_of(&self, item_id: &str) -> AppResult<BTreeSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner.keywords.get(item_id).cloned().unwrap_or_default())
    }

    async fn item(&self, item_id: &str) -> AppResult<Option<Item>> {
        let inner = self.inner.read().await;
        Ok(inner.items.get(item_id).map(|row| Item {
            item_id: item_id.to_string(),
            name: row.name.clone(),
            address: row.address.clone(),
            image_url: row.image_url.clone(),
            url: row.url.clone(),
            keywords: inner.keywords.get(item_id).cloned().unwrap_or_default(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
