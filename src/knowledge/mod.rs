//! Knowledge Base
//!
//! Answers a query from a private document store. The research engine calls
//! this once per planned query when a store id is supplied for the run.

pub mod vector_store;

pub use vector_store::VectorStoreClient;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::types::AppResult;
use crate::utils::with_timeout;

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn answer_from_store(
        &self,
        query: &str,
        store_id: &str,
        output_language: &str,
    ) -> AppResult<String>;
}

/// Per-query knowledge lookup that never fails the run
#[derive(Clone)]
pub struct KnowledgeAugmenter {
    client: Option<Arc<dyn KnowledgeBase>>,
    output_language: String,
    timeout: Duration,
}

impl KnowledgeAugmenter {
    pub fn new(
        client: Option<Arc<dyn KnowledgeBase>>,
        output_language: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            output_language: output_language.into(),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, "en", Duration::from_secs(1))
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Answer for `query`, or an empty string when the lookup fails
    pub async fn lookup(&self, query: &str, store_id: &str) -> String {
        let Some(client) = &self.client else {
            warn!(store_id = %store_id, "Knowledge base requested but no client is configured");
            return String::new();
        };

        match with_timeout(
            self.timeout,
            "knowledge base lookup",
            client.answer_from_store(query, store_id, &self.output_language),
        )
        .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, query = %query, "Knowledge base lookup failed, recording empty answer");
                String::new()
            }
        }
    }
}
