use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jobrec_api::{
    db::{FavoritesStore, MemoryFavoritesStore},
    error::{AppError, AppResult},
    models::{GeoPoint, Item},
    routes::{create_router, recommendations::DEGRADED_HEADER, AppState},
    services::{RecommendOptions, SearchProvider},
};

/// Provider answering two items per keyword and failing for "broken"
struct StubProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl SearchProvider for StubProvider {
    async fn search(&self, _location: GeoPoint, keyword: &str) -> AppResult<Vec<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match keyword {
            "broken" => Err(AppError::ExternalApi("status 500".to_string())),
            "" => Ok(vec![Item::new("nearby-1").with_name("Nearby job")]),
            _ => Ok(vec![
                Item::new(format!("{}-1", keyword)).with_keywords([keyword]),
                Item::new("shared").with_keywords([keyword]),
            ]),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Store that is never reachable
struct DownStore;

#[async_trait::async_trait]
impl FavoritesStore for DownStore {
    async fn add_favorite(&self, _user_id: &str, _item: &Item) -> AppResult<()> {
        Err(AppError::StoreUnavailable("connection refused".to_string()))
    }

    async fn remove_favorite(&self, _user_id: &str, _item_id: &str) -> AppResult<()> {
        Err(AppError::StoreUnavailable("connection refused".to_string()))
    }

    async fn favorited_item_ids(&self, _user_id: &str) -> AppResult<HashSet<String>> {
        Err(AppError::StoreUnavailable("connection refused".to_string()))
    }

    async fn keywords_of(&self, _item_id: &str) -> AppResult<BTreeSet<String>> {
        Err(AppError::StoreUnavailable("connection refused".to_string()))
    }

    async fn item(&self, _item_id: &str) -> AppResult<Option<Item>> {
        Err(AppError::StoreUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

fn create_test_server_with(
    store: Arc<dyn FavoritesStore>,
) -> (TestServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(StubProvider {
        calls: Arc::clone(&calls),
    });
    let state = Arc::new(AppState::new(store, provider, RecommendOptions::default()));
    let app = create_router(state);
    (TestServer::new(app).unwrap(), calls)
}

fn create_test_server() -> (TestServer, Arc<AtomicUsize>) {
    create_test_server_with(Arc::new(MemoryFavoritesStore::new()))
}

fn favorite(item_id: &str, keywords: &[&str]) -> serde_json::Value {
    json!({
        "item_id": item_id,
        "name": format!("Job {}", item_id),
        "address": "Mountain View, CA",
        "image_url": format!("https://img/{}.png", item_id),
        "url": format!("https://jobs/{}", item_id),
        "keywords": keywords,
    })
}

async fn add_favorite(server: &TestServer, user_id: &str, item: serde_json::Value) {
    let response = server
        .post("/api/v1/history")
        .json(&json!({ "user_id": user_id, "favorite": item }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_health_check() {
    let (server, _) = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let (server, _) = create_test_server();
    let response = server.get("/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_add_and_list_history() {
    let (server, _) = create_test_server();

    let response = server
        .post("/api/v1/history")
        .json(&json!({ "user_id": "1111", "favorite": favorite("job-1", &["rust", "backend"]) }))
        .await;
    response.assert_status_ok();
    let result: serde_json::Value = response.json();
    assert_eq!(result["result"], "SUCCESS");

    let response = server
        .get("/api/v1/history")
        .add_query_param("user_id", "1111")
        .await;
    response.assert_status_ok();

    let items: Vec<serde_json::Value> = response.json();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["item_id"], "job-1");
    assert_eq!(items[0]["name"], "Job job-1");
    assert_eq!(items[0]["address"], "Mountain View, CA");
    assert_eq!(items[0]["image_url"], "https://img/job-1.png");
    assert_eq!(items[0]["url"], "https://jobs/job-1");
    assert_eq!(items[0]["keywords"], json!(["backend", "rust"]));
    assert_eq!(items[0]["favorite"], true);
}

#[tokio::test]
async fn test_refavoriting_lists_item_once() {
    let (server, _) = create_test_server();

    add_favorite(&server, "1111", favorite("job-1", &["rust"])).await;
    add_favorite(&server, "1111", favorite("job-1", &["rust"])).await;

    let items: Vec<serde_json::Value> = server
        .get("/api/v1/history")
        .add_query_param("user_id", "1111")
        .await
        .json();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["keywords"], json!(["rust"]));
}

#[tokio::test]
async fn test_remove_favorite() {
    let (server, _) = create_test_server();
    add_favorite(&server, "1111", favorite("job-1", &["rust"])).await;
    add_favorite(&server, "1111", favorite("job-2", &["go"])).await;

    let response = server
        .delete("/api/v1/history")
        .json(&json!({ "user_id": "1111", "favorite": { "item_id": "job-1" } }))
        .await;
    response.assert_status_ok();

    let items: Vec<serde_json::Value> = server
        .get("/api/v1/history")
        .add_query_param("user_id", "1111")
        .await
        .json();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["item_id"], "job-2");
}

#[tokio::test]
async fn test_history_rejects_empty_user() {
    let (server, _) = create_test_server();
    let response = server
        .get("/api/v1/history")
        .add_query_param("user_id", " ")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendation_without_favorites_is_empty() {
    let (server, calls) = create_test_server();

    let response = server
        .get("/api/v1/recommendation")
        .add_query_param("user_id", "1111")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .await;
    response.assert_status_ok();

    let items: Vec<serde_json::Value> = response.json();
    assert!(items.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!response.headers().contains_key(DEGRADED_HEADER));
}

#[tokio::test]
async fn test_recommendation_flow() {
    let (server, calls) = create_test_server();

    // rust:3, java:2, go:1, sql:1
    add_favorite(&server, "1111", favorite("f1", &["rust", "java", "sql"])).await;
    add_favorite(&server, "1111", favorite("f2", &["rust", "java"])).await;
    add_favorite(&server, "1111", favorite("f3", &["rust", "go"])).await;

    let response = server
        .get("/api/v1/recommendation")
        .add_query_param("user_id", "1111")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .await;
    response.assert_status_ok();

    let items: Vec<serde_json::Value> = response.json();
    let ids: Vec<&str> = items
        .iter()
        .map(|item| item["item_id"].as_str().unwrap())
        .collect();

    // "shared" is deduplicated to its first (rust) occurrence
    assert_eq!(ids, vec!["rust-1", "shared", "java-1", "go-1"]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(items.iter().all(|item| item["favorite"] == false));
}

#[tokio::test]
async fn test_recommendation_marks_already_favorited_items() {
    let (server, _) = create_test_server();

    add_favorite(&server, "1111", favorite("shared", &["rust"])).await;

    let items: Vec<serde_json::Value> = server
        .get("/api/v1/recommendation")
        .add_query_param("user_id", "1111")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .await
        .json();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["item_id"], "rust-1");
    assert_eq!(items[0]["favorite"], false);
    assert_eq!(items[1]["item_id"], "shared");
    assert_eq!(items[1]["favorite"], true);
}

#[tokio::test]
async fn test_recommendation_partial_failure_sets_degraded_header() {
    let (server, _) = create_test_server();

    add_favorite(&server, "1111", favorite("f1", &["broken", "rust"])).await;
    add_favorite(&server, "1111", favorite("f2", &["broken"])).await;

    let response = server
        .get("/api/v1/recommendation")
        .add_query_param("user_id", "1111")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .await;
    response.assert_status_ok();

    let items: Vec<serde_json::Value> = response.json();
    let ids: Vec<&str> = items
        .iter()
        .map(|item| item["item_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["rust-1", "shared"]);
    assert_eq!(response.headers()[DEGRADED_HEADER], "true");
}

#[tokio::test]
async fn test_recommendation_with_store_down_is_empty_and_degraded() {
    let (server, calls) = create_test_server_with(Arc::new(DownStore));

    let response = server
        .get("/api/v1/recommendation")
        .add_query_param("user_id", "1111")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .await;
    response.assert_status_ok();

    let items: Vec<serde_json::Value> = response.json();
    assert!(items.is_empty());
    assert_eq!(response.headers()[DEGRADED_HEADER], "true");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_history_with_store_down_is_service_unavailable() {
    let (server, _) = create_test_server_with(Arc::new(DownStore));

    let response = server
        .get("/api/v1/history")
        .add_query_param("user_id", "1111")
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let response = server
        .post("/api/v1/history")
        .json(&json!({ "user_id": "1111", "favorite": favorite("job-1", &["rust"]) }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_recommendation_rejects_invalid_coordinates() {
    let (server, calls) = create_test_server();

    let response = server
        .get("/api/v1/recommendation")
        .add_query_param("user_id", "1111")
        .add_query_param("lat", 95.0)
        .add_query_param("lon", 0.0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_nearby_search() {
    let (server, _) = create_test_server();

    let response = server
        .get("/api/v1/search")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .await;
    response.assert_status_ok();
    let items: Vec<serde_json::Value> = response.json();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["item_id"], "nearby-1");

    let response = server
        .get("/api/v1/search")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .add_query_param("term", "rust")
        .await;
    let items: Vec<serde_json::Value> = response.json();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["keywords"], json!(["rust"]));
    assert_eq!(items[0]["favorite"], false);
}

#[tokio::test]
async fn test_search_marks_favorites_for_user() {
    let (server, _) = create_test_server();
    add_favorite(&server, "1111", favorite("shared", &["rust"])).await;

    let items: Vec<serde_json::Value> = server
        .get("/api/v1/search")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .add_query_param("term", "rust")
        .add_query_param("user_id", "1111")
        .await
        .json();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["item_id"], "rust-1");
    assert_eq!(items[0]["favorite"], false);
    assert_eq!(items[1]["item_id"], "shared");
    assert_eq!(items[1]["favorite"], true);
}

#[tokio::test]
async fn test_search_with_store_down_still_answers() {
    let (server, _) = create_test_server_with(Arc::new(DownStore));

    let response = server
        .get("/api/v1/search")
        .add_query_param("lat", 37.38)
        .add_query_param("lon", -122.08)
        .add_query_param("user_id", "1111")
        .await;
    response.assert_status_ok();

    let items: Vec<serde_json::Value> = response.json();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["favorite"], false);
}

#[tokio::test]
async fn test_missing_query_param_is_json_bad_request() {
    let (server, calls) = create_test_server();

    let response = server
        .get("/api/v1/recommendation")
        .add_query_param("user_id", "1111")
        .add_query_param("lon", -122.08)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("lat"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let response = server.get("/api/v1/search").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());

    let response = server.get("/api/v1/history").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_favorite_body_is_json_bad_request() {
    let (server, _) = create_test_server();

    let response = server
        .post("/api/v1/history")
        .json(&json!({ "user_id": "1111" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("favorite"));
}
