//! Exa Client
//!
//! Calls `POST /search` with `contents.text` so every hit carries the page
//! body. `livecrawl: "always"` forces a fresh fetch instead of Exa's cache.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{SearchError, SearchProvider, SearchRequest};
use crate::models::SearchResult;

const DEFAULT_BASE_URL: &str = "https://api.exa.ai";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchRequest<'a> {
    query: &'a str,
    num_results: usize,
    contents: ExaContents,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_published_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_published_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclude_domains: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_text: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclude_text: Option<&'a [String]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaContents {
    text: bool,
    livecrawl: &'static str,
}

#[derive(Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResult {
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

#[derive(Deserialize)]
struct ExaErrorResponse {
    error: String,
}

/// Exa client for live web search
pub struct ExaClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ExaClient {
    /// Create a new Exa client against the public API
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Configure client from config. Returns `None` when no key is set.
    pub fn from_config(
        config: &crate::config::SearchConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, SearchError> {
        if config.exa_api_key.is_empty() {
            return Ok(None);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            api_key: config.exa_api_key.clone(),
            base_url: config.exa_base_url.trim_end_matches('/').to_string(),
        }))
    }

    /// Point the client at a different host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SearchProvider for ExaClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NoApiKey);
        }

        info!(query = %request.query, num_results = request.num_results, "Searching the web via Exa");

        let filters = &request.filters;
        let body = ExaSearchRequest {
            query: &request.query,
            num_results: request.num_results,
            contents: ExaContents {
                text: true,
                livecrawl: "always",
            },
            start_published_date: filters.start_published_date.as_deref(),
            end_published_date: filters.end_published_date.as_deref(),
            include_domains: filters.include_domains.as_deref(),
            exclude_domains: filters.exclude_domains.as_deref(),
            include_text: filters.include_text.as_deref(),
            exclude_text: filters.exclude_text.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ExaErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ExaSearchResponse =
            serde_json::from_str(&text).map_err(|e| SearchError::ParseError(e.to_string()))?;

        let results: Vec<SearchResult> = parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title.unwrap_or_default(),
                url: r.url,
                content: r.text.unwrap_or_default(),
                published_date: r.published_date,
            })
            .collect();

        for (index, result) in results.iter().enumerate() {
            debug!(index, title = %result.title, url = %result.url, "Search hit");
        }

        info!(count = results.len(), "Exa search completed");
        Ok(results)
    }
}
