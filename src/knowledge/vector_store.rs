// OpenAI vector store lookup through the Responses API `file_search` tool

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::KnowledgeBase;
use crate::config::KnowledgeConfig;
use crate::types::{AppError, AppResult};

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    tools: Vec<FileSearchTool<'a>>,
    input: Vec<InputMessage>,
}

#[derive(Serialize)]
struct FileSearchTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    vector_store_ids: [&'a str; 1],
    max_num_results: u32,
}

#[derive(Serialize)]
struct InputMessage {
    role: &'static str,
    content: String,
}

impl InputMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Knowledge base backed by an OpenAI vector store
pub struct VectorStoreClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_num_results: u32,
}

impl VectorStoreClient {
    /// Returns `None` when no API key is configured
    pub fn from_config(config: &KnowledgeConfig, timeout: Duration) -> AppResult<Option<Self>> {
        if config.api_key.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_num_results: config.max_num_results,
        }))
    }

    /// Collects the `output_text` parts of every message item
    fn output_text(response: ResponsesResponse) -> String {
        response
            .output
            .into_iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl KnowledgeBase for VectorStoreClient {
    async fn answer_from_store(
        &self,
        query: &str,
        store_id: &str,
        output_language: &str,
    ) -> AppResult<String> {
        info!(query = %query, store_id = %store_id, "Querying knowledge base");

        let body = ResponsesRequest {
            model: &self.model,
            tools: vec![FileSearchTool {
                kind: "file_search",
                vector_store_ids: [store_id],
                max_num_results: self.max_num_results,
            }],
            input: vec![
                InputMessage::new(
                    "developer",
                    format!(
                        "Search the vector store for information. Output format language: {}",
                        output_language
                    ),
                ),
                InputMessage::new("user", query),
            ],
        };

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::KnowledgeBase(format!(
                "Responses API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: ResponsesResponse = response
            .json()
            .await
            .map_err(|e| AppError::KnowledgeBase(format!("Failed to parse response: {}", e)))?;

        let answer = Self::output_text(parsed);
        debug!(answer_len = answer.len(), "Knowledge base answered");
        Ok(answer)
    }
}
