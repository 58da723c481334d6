//! Agent System
//!
//! The research agents behind a deep-search request:
//!
//! - **Query Planner**: turns a prompt into a bounded set of search queries
//! - **Search Agent**: tool-calling loop that searches and filters pages for relevance and novelty
//! - **Learning Extractor**: distils each accepted page into a finding and follow-up questions
//! - **Research Engine**: recursive depth/breadth-bounded driver over the agents above
//! - **Report Synthesizer**: writes the final report from the accumulated research
//!
//! ## Pipeline Overview
//!
//! ```text
//! Prompt (+ focus topics, filters, knowledge base id)
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Query     │  → 1..=breadth queries
//! │  Planner    │
//! └─────────────┘
//!      │  for each query, one at a time
//!      ▼
//! ┌─────────────┐
//! │   Search    │  → searchWeb / evaluate until the step budget runs out
//! │   Agent     │
//! └─────────────┘
//!      │  for each accepted page
//!      ▼
//! ┌─────────────┐
//! │  Learning   │  → follow-up prompt, recurse with depth - 1
//! │ Extractor   │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Report    │  → final text
//! │ Synthesizer │
//! └─────────────┘
//! ```

pub mod deep_research;
pub mod learning;
pub mod planning;
pub mod prompts;
pub mod relevance;
pub mod reply;

pub use deep_research::{ResearchEngine, ResearchOptions};
pub use learning::LearningExtractor;
pub use planning::QueryPlanner;
pub use relevance::{AgentSettings, DrainPolicy, SearchAgent};
pub use reply::ReportSynthesizer;

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::knowledge::{KnowledgeAugmenter, KnowledgeBase, VectorStoreClient};
use crate::llm::{LLMProviderConfig, LLM};
use crate::models::Research;
use crate::search::{ExaClient, SearchProvider};
use crate::types::{AppError, AppResult};

/// Engine plus synthesizer, built once at startup and shared by every request
pub struct ResearchPipeline {
    engine: ResearchEngine,
    synthesizer: ReportSynthesizer,
    output_language: String,
}

impl ResearchPipeline {
    pub fn new(
        engine: ResearchEngine,
        synthesizer: ReportSynthesizer,
        output_language: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            synthesizer,
            output_language: output_language.into(),
        }
    }

    /// Wires the shipped OpenAI-compatible, Exa and vector-store clients
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let api_key = config.llm.active_api_key().ok_or_else(|| {
            AppError::Config(format!("No API key configured for {}", config.llm.provider))
        })?;

        let research_llm = LLM::new(
            LLMProviderConfig {
                provider: config.llm.provider,
                api_key,
                base_url: config.llm.base_url(),
                timeout: config.llm.timeout(),
            },
            config.llm.research_model.clone(),
        )?;
        let report_llm = research_llm.with_model(config.llm.report_model.clone());

        let search: Arc<dyn SearchProvider> = Arc::new(
            ExaClient::from_config(&config.search, config.llm.timeout())?
                .ok_or_else(|| AppError::Config("EXA_API_KEY is not set".to_string()))?,
        );

        let knowledge: Option<Arc<dyn KnowledgeBase>> =
            match VectorStoreClient::from_config(&config.knowledge, config.llm.timeout())? {
                Some(client) => Some(Arc::new(client)),
                None => {
                    warn!("No OpenAI key for the knowledge base, vector store lookups disabled");
                    None
                }
            };

        let call_timeout = config.research.call_timeout();
        let engine = ResearchEngine::new(
            QueryPlanner::new(research_llm.clone(), call_timeout),
            SearchAgent::new(
                research_llm.clone(),
                search,
                AgentSettings {
                    max_steps: config.research.max_tool_steps,
                    drain_policy: config.research.drain_policy,
                    call_timeout,
                },
            ),
            LearningExtractor::new(research_llm.clone(), call_timeout),
            KnowledgeAugmenter::new(
                knowledge,
                config.knowledge.output_language.clone(),
                call_timeout,
            ),
        );

        info!(
            provider = %config.llm.provider,
            research_model = %research_llm.model(),
            report_model = %report_llm.model(),
            "Research pipeline ready"
        );

        Ok(Self::new(
            engine,
            ReportSynthesizer::new(report_llm, call_timeout),
            config.knowledge.output_language.clone(),
        ))
    }

    pub fn engine(&self) -> &ResearchEngine {
        &self.engine
    }

    /// Runs the research and writes the report.
    ///
    /// `system_prompt` replaces the default report instructions; the role,
    /// date, language and focus preamble is always prepended.
    pub async fn execute(
        &self,
        options: &ResearchOptions,
        prompt: &str,
        depth: u32,
        breadth: usize,
        system_prompt: Option<&str>,
    ) -> AppResult<String> {
        let research = self
            .engine
            .run_deep_research(options, prompt, depth, breadth)
            .await?;
        self.report(&research, options, system_prompt).await
    }

    pub async fn report(
        &self,
        research: &Research,
        options: &ResearchOptions,
        system_prompt: Option<&str>,
    ) -> AppResult<String> {
        let now = Utc::now();
        let system = match system_prompt.map(str::trim).filter(|s| !s.is_empty()) {
            Some(custom) => {
                prompts::with_preamble(custom, &options.focus_topics, &self.output_language, now)
            }
            None => prompts::report_system_prompt(&options.focus_topics, &self.output_language, now),
        };

        self.synthesizer.synthesize(research, &system).await
    }
}
