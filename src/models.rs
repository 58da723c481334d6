use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::agents::ResearchPipeline;
use crate::config::Config;
use crate::search::SearchFilters;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<ResearchPipeline>,
}

/// One page returned by the search provider. Identity is the `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_date: Option<String>,
}

/// A distilled finding plus the follow-up questions it raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learning {
    pub learning: String,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// Accumulated state of one top-level investigation.
///
/// Every sequence is append-only for the lifetime of a run. A single value is
/// threaded by `&mut` through every recursive branch so later branches see
/// what earlier ones accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Research {
    pub query: Option<String>,
    pub queries: Vec<String>,
    pub search_results: Vec<SearchResult>,
    pub knowledge_base_results: Vec<String>,
    pub learnings: Vec<Learning>,
    pub completed_queries: Vec<String>,
}

impl Research {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the root prompt. Later calls are no-ops.
    pub fn set_root_once(&mut self, prompt: &str) {
        if self.query.is_none() {
            self.query = Some(prompt.to_string());
        }
    }

    /// The root prompt, or an empty string before the first `run`
    pub fn root(&self) -> &str {
        self.query.as_deref().unwrap_or_default()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.search_results.iter().any(|r| r.url == url)
    }

    pub fn record_queries(&mut self, queries: &[String]) {
        self.queries.extend_from_slice(queries);
    }

    /// Appends accepted results, skipping URLs already held
    pub fn record_search_results(&mut self, results: &[SearchResult]) {
        for result in results {
            if !self.contains_url(&result.url) {
                self.search_results.push(result.clone());
            }
        }
    }

    pub fn record_knowledge(&mut self, answer: String) {
        self.knowledge_base_results.push(answer);
    }

    /// Stores a learning together with the query that produced it
    pub fn record_learning(&mut self, query: &str, learning: Learning) {
        self.learnings.push(learning);
        self.completed_queries.push(query.to_string());
    }
}

/// Deepest recursion a request may ask for, by `depth` or by focus topics
pub const MAX_DEPTH: u32 = 10;

/// Body of `POST /api/ai/deep-search`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_depth"))]
pub struct DeepSearchRequest {
    #[validate(length(min = 1))]
    pub prompt: String,
    /// Ignored when focus topics are given
    pub depth: u32,
    #[validate(range(min = 1, max = 7))]
    pub breadth: usize,
    #[validate(custom(function = "validate_focus_topics"))]
    pub vector_of_thought: Vec<String>,
    #[serde(default)]
    pub vector_store_id: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub start_published_date: Option<String>,
    #[serde(default)]
    pub end_published_date: Option<String>,
    #[serde(default)]
    pub include_domains: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_domains: Option<Vec<String>>,
    #[serde(default)]
    pub include_text: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_text: Option<Vec<String>>,
}

fn non_blank(topics: &[String]) -> usize {
    topics.iter().filter(|t| !t.trim().is_empty()).count()
}

fn validate_focus_topics(topics: &Vec<String>) -> Result<(), ValidationError> {
    if non_blank(topics) > MAX_DEPTH as usize {
        return Err(ValidationError::new("too_many_focus_topics"));
    }
    Ok(())
}

/// `depth` must be in `1..=MAX_DEPTH` unless focus topics set the depth
fn validate_depth(request: &DeepSearchRequest) -> Result<(), ValidationError> {
    if non_blank(&request.vector_of_thought) == 0 && !(1..=MAX_DEPTH).contains(&request.depth) {
        return Err(ValidationError::new("depth_out_of_range"));
    }
    Ok(())
}

impl DeepSearchRequest {
    /// Focus topics override the requested depth, one level per topic
    pub fn effective_depth(&self) -> u32 {
        let topics = self.focus_topics().len();
        if topics > 0 {
            topics as u32
        } else {
            self.depth
        }
    }

    pub fn focus_topics(&self) -> Vec<String> {
        self.vector_of_thought
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            start_published_date: self.start_published_date.clone(),
            end_published_date: self.end_published_date.clone(),
            include_domains: self.include_domains.clone(),
            exclude_domains: self.exclude_domains.clone(),
            include_text: self.include_text.clone(),
            exclude_text: self.exclude_text.clone(),
        }
        .normalized()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepSearchResponse {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub llm_provider: String,
    pub knowledge_base: bool,
}
