//! Query Planner
//!
//! Turns a research prompt into a bounded list of web search queries with a
//! single structured-generation call.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::llm::LLM;
use crate::types::{AppError, AppResult, ResponseFormat};
use crate::utils::with_timeout;

/// Upper bound on queries per planning call
pub const MAX_QUERIES: usize = 7;

#[derive(Debug, Deserialize)]
struct PlannedQueries {
    queries: Vec<String>,
}

#[derive(Clone)]
pub struct QueryPlanner {
    llm: LLM,
    timeout: Duration,
}

impl QueryPlanner {
    pub fn new(llm: LLM, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Returns between 1 and `count` queries (`count` is clamped to `1..=7`).
    /// An LLM failure or an empty plan is an `AppError::Planning`.
    pub async fn plan(&self, topic: &str, count: usize) -> AppResult<Vec<String>> {
        let count = count.clamp(1, MAX_QUERIES);
        info!(count, topic_len = topic.len(), "Planning search queries");

        let prompt = Self::create_planning_prompt(topic, count);
        let planned: PlannedQueries = with_timeout(
            self.timeout,
            "query planning",
            self.llm.generate_object(None, &prompt, Self::response_format()),
        )
        .await
        .map_err(|e| AppError::Planning(e.to_string()))?;

        let queries: Vec<String> = planned
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(count)
            .collect();

        if queries.is_empty() {
            return Err(AppError::Planning("model returned no queries".to_string()));
        }

        debug!(?queries, "Planned queries");
        Ok(queries)
    }

    fn create_planning_prompt(topic: &str, count: usize) -> String {
        format!(
            "Generate {count} search queries for the following query: {topic}",
            count = count,
            topic = topic
        )
    }

    fn response_format() -> ResponseFormat {
        ResponseFormat::json_schema(
            "search_queries",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "queries": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["queries"],
                "additionalProperties": false
            }),
        )
    }
}
