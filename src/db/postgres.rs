use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{db::FavoritesStore, error::AppResult, models::Item};

/// Creates a PostgreSQL connection pool
///
/// The pool connects lazily, so the service starts even while the database is
/// down; operations then fail with `StoreUnavailable` once `acquire_timeout`
/// elapses.
pub fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(database_url)?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct ItemRow {
    item_id: String,
    name: String,
    address: String,
    image_url: String,
    url: String,
}

impl ItemRow {
    fn into_item(self, keywords: BTreeSet<String>) -> Item {
        Item {
            item_id: self.item_id,
            name: self.name,
            address: self.address,
            image_url: self.image_url,
            url: self.url,
            keywords,
        }
    }
}

/// Favorites store backed by the `items`, `keywords` and `history` tables
///
/// Each operation checks a connection (or a transaction) out of the pool and
/// returns it when the operation's future completes or is dropped.
#[derive(Clone)]
pub struct PgFavoritesStore {
    pool: PgPool,
}

impl PgFavoritesStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FavoritesStore for PgFavoritesStore {
    async fn add_favorite(&self, user_id: &str, item: &Item) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO items (item_id, name, address, image_url, url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_id) DO NOTHING
            "#,
        )
        .bind(&item.item_id)
        .bind(&item.name)
        .bind(&item.address)
        .bind(&item.image_url)
        .bind(&item.url)
        .execute(&mut *tx)
        .await?;

        if !item.keywords.is_empty() {
            let keywords: Vec<String> = item.keywords.iter().cloned().collect();
            sqlx::query(
                r#"
                INSERT INTO keywords (item_id, keyword)
                SELECT $1, UNNEST($2::text[])
                ON CONFLICT (item_id, keyword) DO NOTHING
                "#,
            )
            .bind(&item.item_id)
            .bind(&keywords)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT INTO history (user_id, item_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(&item.item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(user_id = %user_id, item_id = %item.item_id, "Favorite saved");
        Ok(())
    }

    async fn remove_favorite(&self, user_id: &str, item_id: &str) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query("DELETE FROM history WHERE user_id = $1 AND item_id = $2")
            .bind(user_id)
            .bind(item_id)
            .execute(&mut *conn)
            .await?;

        tracing::debug!(
            user_id = %user_id,
            item_id = %item_id,
            rows = result.rows_affected(),
            "Favorite removed"
        );
        Ok(())
    }

    async fn favorited_item_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let mut conn = self.pool.acquire().await?;

        let ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT item_id FROM history WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&mut *conn)
                .await?;

        Ok(ids.into_iter().collect())
    }

    async fn keywords_of(&self, item_id: &str) -> AppResult<BTreeSet<String>> {
        let mut conn = self.pool.acquire().await?;

        let keywords: Vec<String> =
            sqlx::query_scalar("SELECT keyword FROM keywords WHERE item_id = $1")
                .bind(item_id)
                .fetch_all(&mut *conn)
                .await?;

        Ok(keywords.into_iter().collect())
    }

    async fn item(&self, item_id: &str) -> AppResult<Option<Item>> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<ItemRow> = sqlx::query_as(
            "SELECT item_id, name, address, image_url, url FROM items WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let keywords: Vec<String> =
            sqlx::query_scalar("SELECT keyword FROM keywords WHERE item_id = $1")
                .bind(item_id)
                .fetch_all(&mut *conn)
                .await?;

        Ok(Some(row.into_item(keywords.into_iter().collect())))
    }

    async fn favorited_items(&self, user_id: &str) -> AppResult<HashSet<Item>> {
        let mut conn = self.pool.acquire().await?;

        // The join skips history rows whose item is missing from `items`
        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT i.item_id, i.name, i.address, i.image_url, i.url
            FROM items i
            WHERE i.item_id IN (SELECT item_id FROM history WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        if rows.is_empty() {
            return Ok(HashSet::new());
        }

        let ids: Vec<String> = rows.iter().map(|r| r.item_id.clone()).collect();
        let keyword_rows: Vec<(String, String)> =
            sqlx::query_as("SELECT item_id, keyword FROM keywords WHERE item_id = ANY($1)")
                .bind(&ids)
                .fetch_all(&mut *conn)
                .await?;

        let mut keywords: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (item_id, keyword) in keyword_rows {
            keywords.entry(item_id).or_default().insert(keyword);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let item_keywords = keywords.remove(&row.item_id).unwrap_or_default();
                row.into_item(item_keywords)
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
