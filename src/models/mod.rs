use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod item;
pub mod location;

pub use item::Item;
pub use location::{validate_user_id, GeoPoint};

/// Body for favoriting an item
#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub user_id: String,
    pub favorite: Item,
}

/// Body for unfavoriting an item; only the id of `favorite` is read
#[derive(Debug, Deserialize)]
pub struct RemoveFavoriteRequest {
    pub user_id: String,
    pub favorite: FavoriteRef,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRef {
    pub item_id: String,
}

/// Acknowledgement returned by history writes
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WriteResult {
    pub result: String,
}

impl WriteResult {
    pub fn success() -> Self {
        Self {
            result: "SUCCESS".to_string(),
        }
    }
}

/// Item as returned to clients, marked when the caller has favorited it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemResponse {
    #[serde(flatten)]
    pub item: Item,
    pub favorite: bool,
}

impl ItemResponse {
    pub fn new(item: Item, favorite: bool) -> Self {
        Self { item, favorite }
    }

    /// Marks each item whose id is in `favorited`, keeping input order
    pub fn mark_all(items: Vec<Item>, favorited: &HashSet<String>) -> Vec<Self> {
        items
            .into_iter()
            .map(|item| {
                let favorite = favorited.contains(&item.item_id);
                Self::new(item, favorite)
            })
            .collect()
    }
}

// ============================================================================
// Job Board API Types
// ============================================================================

/// Raw posting returned by the job board `positions.json` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct JobPosting {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company_logo: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl JobPosting {
    /// Converts the posting into an item tagged with the keyword it matched
    pub fn into_item(self, keyword: &str) -> Item {
        let keyword = keyword.trim().to_lowercase();
        let item = Item::new(self.id)
            .with_name(self.title.unwrap_or_default())
            .with_address(self.location.unwrap_or_default())
            .with_image_url(self.company_logo.unwrap_or_default())
            .with_url(self.url.unwrap_or_default());

        if keyword.is_empty() {
            item
        } else {
            item.with_keywords([keyword])
        }
    }
}
