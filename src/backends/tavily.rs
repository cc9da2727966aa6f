use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ErrorType};

use super::{SearchDepth, WebSearch, WebSearchResult};

/// Canonical `WebSearch` adapter: bearer-authenticated HTTP POST against a
/// Tavily-shaped search API, configured from `TAVILY_API_KEY`.
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self {
            http,
            api_key,
            base_url: "https://api.tavily.com/search".to_string(),
        }
    }

    /// Overrides the endpoint URL. Only ever needed to point this client at
    /// a stub server in tests.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
    #[serde(default)]
    score: f64,
    published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        include_domains: Option<&[String]>,
        exclude_domains: Option<&[String]>,
        depth: SearchDepth,
    ) -> Result<Vec<WebSearchResult>, ApiError> {
        let body = json!({
            "query": query,
            "max_results": max_results,
            "search_depth": match depth {
                SearchDepth::Basic => "basic",
                SearchDepth::Advanced => "advanced",
            },
            "include_domains": include_domains.unwrap_or_default(),
            "exclude_domains": exclude_domains.unwrap_or_default(),
        });

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::new(ErrorType::BackendUnavailable, e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::new(ErrorType::QuotaExceeded, "Tavily quota exceeded"));
        }
        if !response.status().is_success() {
            return Err(ApiError::new(
                ErrorType::BackendUnavailable,
                format!("Tavily returned status {}", response.status()),
            ));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ApiError::new(ErrorType::BackendUnavailable, e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| WebSearchResult {
                title: r.title,
                url: r.url,
                content: r.content,
                score: r.score,
                published_date: r.published_date,
            })
            .collect())
    }
}
