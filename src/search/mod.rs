//! Search Module
//!
//! Web search used by the research agent's `searchWeb` tool. The engine only
//! sees the [`SearchProvider`] trait; [`ExaClient`] is the shipped backend and
//! always asks for live-crawled page text rather than cached snapshots.

pub mod exa;

pub use exa::ExaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SearchResult;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search API key not configured")]
    NoApiKey,

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Search API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse search results: {0}")]
    ParseError(String),
}

/// Caller-supplied restrictions applied to every search of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub start_published_date: Option<String>,
    pub end_published_date: Option<String>,
    pub include_domains: Option<Vec<String>>,
    pub exclude_domains: Option<Vec<String>>,
    pub include_text: Option<Vec<String>>,
    pub exclude_text: Option<Vec<String>>,
}

impl SearchFilters {
    /// Drops blank entries so empty form fields never reach the provider
    pub fn normalized(self) -> Self {
        fn text(value: Option<String>) -> Option<String> {
            value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        fn list(values: Option<Vec<String>>) -> Option<Vec<String>> {
            values
                .map(|v| {
                    v.into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|v| !v.is_empty())
        }

        Self {
            start_published_date: text(self.start_published_date),
            end_published_date: text(self.end_published_date),
            include_domains: list(self.include_domains),
            exclude_domains: list(self.exclude_domains),
            include_text: list(self.include_text),
            exclude_text: list(self.exclude_text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub num_results: usize,
    pub filters: SearchFilters,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, SearchError>;
}
