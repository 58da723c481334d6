//! Learning Extractor
//!
//! Distils one accepted page into a finding and a set of follow-up questions
//! that seed the next level of research.

use std::time::Duration;
use tracing::{debug, info};

use crate::llm::LLM;
use crate::models::{Learning, SearchResult};
use crate::types::{AppError, AppResult, ResponseFormat};
use crate::utils::with_timeout;

/// Stored in place of a blank finding
const NO_INSIGHT: &str = "No clear insight was found in this source.";

#[derive(Clone)]
pub struct LearningExtractor {
    llm: LLM,
    timeout: Duration,
}

impl LearningExtractor {
    pub fn new(llm: LLM, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn extract(&self, query: &str, result: &SearchResult) -> AppResult<Learning> {
        info!(url = %result.url, "Extracting learning");

        let prompt = Self::create_learning_prompt(query, result)?;
        let mut learning: Learning = with_timeout(
            self.timeout,
            "learning extraction",
            self.llm.generate_object(None, &prompt, Self::response_format()),
        )
        .await
        .map_err(|e| AppError::Extraction(e.to_string()))?;

        if learning.learning.trim().is_empty() {
            learning.learning = NO_INSIGHT.to_string();
        }
        learning
            .follow_up_questions
            .retain(|question| !question.trim().is_empty());

        debug!(
            follow_ups = learning.follow_up_questions.len(),
            "Learning extracted"
        );
        Ok(learning)
    }

    fn create_learning_prompt(query: &str, result: &SearchResult) -> AppResult<String> {
        let result_json = serde_json::to_string_pretty(result)
            .map_err(|e| AppError::Extraction(e.to_string()))?;

        Ok(format!(
            r#"The user is researching "{query}". The following search result was deemed relevant.
Generate a learning and a follow-up question from the following search result:

<search_result>
{result}
</search_result>"#,
            query = query,
            result = result_json
        ))
    }

    fn response_format() -> ResponseFormat {
        ResponseFormat::json_schema(
            "learning",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "learning": { "type": "string" },
                    "followUpQuestions": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["learning", "followUpQuestions"],
                "additionalProperties": false
            }),
        )
    }
}
