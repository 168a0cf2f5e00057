/// Job board API provider
///
/// Queries a GitHub-Jobs style `positions.json` endpoint:
/// `GET {api_url}/positions.json?description={keyword}&lat={lat}&long={lon}`
///
/// Each posting becomes an `Item` tagged with the keyword it was found under,
/// so favoriting it feeds that keyword back into the user's profile.
use crate::{
    error::{AppError, AppResult},
    models::{GeoPoint, Item, JobPosting},
    services::providers::SearchProvider,
};
use reqwest::Client as HttpClient;
use std::time::Duration;

#[derive(Clone)]
pub struct JobBoardProvider {
    http_client: HttpClient,
    api_url: String,
}

impl JobBoardProvider {
    /// Creates a provider whose requests time out after `timeout`
    pub fn new(api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Query parameters for one search
    fn query_params(location: GeoPoint, keyword: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("lat", location.lat.to_string()),
            ("long", location.lon.to_string()),
        ];
        let keyword = keyword.trim();
        if !keyword.is_empty() {
            params.push(("description", keyword.to_string()));
        }
        params
    }
}

#[async_trait::async_trait]
impl SearchProvider for JobBoardProvider {
    async fn search(&self, location: GeoPoint, keyword: &str) -> AppResult<Vec<Item>> {
        let url = format!("{}/positions.json", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&Self::query_params(location, keyword))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Job board API returned status {}: {}",
                status, body
            )));
        }

        let response_text = response.text().await?;
        tracing::debug!(response = %response_text, "Raw job board API response");

        let postings: Vec<JobPosting> = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(error = %e, "Failed to deserialize job board response");
            AppError::ExternalApi(format!("Failed to parse job board response: {}", e))
        })?;

        let items: Vec<Item> = postings
            .into_iter()
            .map(|posting| posting.into_item(keyword))
            .collect();

        tracing::info!(
            keyword = %keyword,
            location = %location,
            results = items.len(),
            provider = "job_board",
            "Search completed"
        );

        Ok(items)
    }

    fn name(&self) -> &'static str {
        "job_board"
    }
}
