//! Search-and-Filter Agent
//!
//! A bounded tool-calling conversation in which the model acts as a research
//! agent with two tools:
//!
//! - `searchWeb` runs a web search and pushes every hit onto a pending stack
//! - `evaluate` pops pending hits (latest first) and classifies each one as
//!   relevant or irrelevant against the query and the already accepted pages
//!
//! The loop, the stack and the step counter live here. The model only picks
//! the next tool. Whatever was accepted when the step budget runs out (or the
//! model stops calling tools) is the result.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::llm::LLM;
use crate::models::SearchResult;
use crate::search::{SearchFilters, SearchProvider, SearchRequest};
use crate::types::{AppError, AppResult, LLMMessage, ToolCall, ToolDefinition};
use crate::utils::with_timeout;

pub const SEARCH_TOOL: &str = "searchWeb";
pub const EVALUATE_TOOL: &str = "evaluate";

/// Characters of page text echoed back to the driving model per hit
const PREVIEW_CHARS: usize = 1_000;

const AGENT_SYSTEM_PROMPT: &str = "You are a researcher. For each query, search the web and then evaluate if the results are relevant and will help answer the following query";

/// How many pending results a single `evaluate` call judges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainPolicy {
    /// Judge only the most recently pushed result
    #[default]
    Latest,
    /// Judge every pending result, newest first
    All,
}

impl std::str::FromStr for DrainPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(DrainPolicy::Latest),
            "all" => Ok(DrainPolicy::All),
            other => Err(AppError::Config(format!("Unknown drain policy: {}", other))),
        }
    }
}

/// Classification of a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Relevant,
    Irrelevant,
}

/// What one `evaluate` call did, reported back to the model as a hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    NothingPending,
    Relevant,
    Irrelevant,
    Failed,
}

impl EvaluationStatus {
    pub fn hint(&self) -> &'static str {
        match self {
            EvaluationStatus::NothingPending => "No search results available for evaluation.",
            EvaluationStatus::Relevant => {
                "Search results are relevant. End research for this query."
            }
            EvaluationStatus::Irrelevant => {
                "Search results are irrelevant. Please search again with a more specific query."
            }
            EvaluationStatus::Failed => "Evaluation tool error occurred, skipping this evaluation.",
        }
    }
}

/// Pending stack and accepted accumulator for one query
pub struct RelevanceFilter<'a> {
    llm: &'a LLM,
    query: &'a str,
    already_accepted: &'a [SearchResult],
    policy: DrainPolicy,
    timeout: Duration,
    pending: Vec<SearchResult>,
    accepted: Vec<SearchResult>,
}

impl<'a> RelevanceFilter<'a> {
    pub fn new(
        llm: &'a LLM,
        query: &'a str,
        already_accepted: &'a [SearchResult],
        policy: DrainPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            query,
            already_accepted,
            policy,
            timeout,
            pending: Vec::new(),
            accepted: Vec::new(),
        }
    }

    pub fn push_pending(&mut self, results: impl IntoIterator<Item = SearchResult>) {
        self.pending.extend(results);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn accepted(&self) -> &[SearchResult] {
        &self.accepted
    }

    pub fn into_accepted(self) -> Vec<SearchResult> {
        self.accepted
    }

    /// Pops pending results per the drain policy and judges each one.
    /// Never returns an error; failures become `EvaluationStatus::Failed`.
    pub async fn evaluate(&mut self) -> EvaluationStatus {
        let Some(first) = self.pending.pop() else {
            return EvaluationStatus::NothingPending;
        };

        let mut batch = vec![first];
        if self.policy == DrainPolicy::All {
            while let Some(next) = self.pending.pop() {
                batch.push(next);
            }
        }

        let mut any_relevant = false;
        let mut any_judged = false;
        for candidate in batch {
            match self.judge(&candidate).await {
                Ok(Relevance::Relevant) => {
                    any_judged = true;
                    any_relevant = true;
                    self.accepted.push(candidate);
                }
                Ok(Relevance::Irrelevant) => any_judged = true,
                Err(e) => {
                    warn!(error = %e, url = %candidate.url, "Error in evaluate tool");
                }
            }
        }

        match (any_relevant, any_judged) {
            (true, _) => EvaluationStatus::Relevant,
            (false, true) => EvaluationStatus::Irrelevant,
            (false, false) => EvaluationStatus::Failed,
        }
    }

    fn is_duplicate(&self, url: &str) -> bool {
        self.already_accepted.iter().any(|r| r.url == url)
            || self.accepted.iter().any(|r| r.url == url)
    }

    async fn judge(&self, candidate: &SearchResult) -> AppResult<Relevance> {
        if self.is_duplicate(&candidate.url) {
            debug!(url = %candidate.url, "Already accepted, marking irrelevant");
            return Ok(Relevance::Irrelevant);
        }

        let prompt = self.create_evaluation_prompt(candidate)?;
        let verdict = with_timeout(
            self.timeout,
            "relevance evaluation",
            self.llm.generate_enum(&prompt, &["relevant", "irrelevant"]),
        )
        .await?;

        info!(url = %candidate.url, verdict = %verdict, "Evaluated search result");
        Ok(if verdict == "relevant" {
            Relevance::Relevant
        } else {
            Relevance::Irrelevant
        })
    }

    fn create_evaluation_prompt(&self, candidate: &SearchResult) -> AppResult<String> {
        let existing: Vec<&str> = self
            .already_accepted
            .iter()
            .chain(self.accepted.iter())
            .map(|r| r.url.as_str())
            .collect();

        let candidate_json = serde_json::to_string(candidate)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let existing_json =
            serde_json::to_string(&existing).map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(format!(
            r#"Evaluate whether the search results are relevant and will help answer the following query: {query}. If the page already exists in the existing results, mark it as irrelevant.

<search_results>
{candidate}
</search_results>

<existing_results>
{existing}
</existing_results>"#,
            query = self.query,
            candidate = candidate_json,
            existing = existing_json
        ))
    }
}

/// Knobs of the search-and-filter loop
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Tool invocations allowed per query
    pub max_steps: usize,
    pub drain_policy: DrainPolicy,
    pub call_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 7,
            drain_policy: DrainPolicy::Latest,
            call_timeout: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchWebArgs {
    query: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchHitPreview<'a> {
    title: &'a str,
    url: &'a str,
    published_date: Option<&'a str>,
    content: String,
}

/// Drives the tool-calling conversation for one planned query
#[derive(Clone)]
pub struct SearchAgent {
    llm: LLM,
    search: Arc<dyn SearchProvider>,
    settings: AgentSettings,
}

impl SearchAgent {
    pub fn new(llm: LLM, search: Arc<dyn SearchProvider>, settings: AgentSettings) -> Self {
        Self {
            llm,
            search,
            settings,
        }
    }

    pub fn tool_definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SEARCH_TOOL.to_string(),
                description: "Search the web for information about a given query".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "minLength": 1 }
                    },
                    "required": ["query"]
                }),
            },
            ToolDefinition {
                name: EVALUATE_TOOL.to_string(),
                description: "Evaluate the search results".to_string(),
                parameters: serde_json::json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    /// Returns the subset of fetched pages judged relevant and novel with
    /// respect to `already_accepted`.
    pub async fn search_and_filter(
        &self,
        query: &str,
        breadth: usize,
        filters: &SearchFilters,
        already_accepted: &[SearchResult],
    ) -> Vec<SearchResult> {
        let mut filter = RelevanceFilter::new(
            &self.llm,
            query,
            already_accepted,
            self.settings.drain_policy,
            self.settings.call_timeout,
        );
        let tools = Self::tool_definitions();
        let mut messages = vec![LLMMessage::user(format!(
            "Search the web for information about {}, For each item, where possible, collect detailed examples of use cases (news stories) with a detailed description.",
            query
        ))];
        let mut steps = 0;

        'conversation: while steps < self.settings.max_steps {
            let response = match with_timeout(
                self.settings.call_timeout,
                "research agent turn",
                self.llm.complete_with_tools(AGENT_SYSTEM_PROMPT, &messages, &tools),
            )
            .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, query = %query, "Research agent turn failed, keeping accepted results");
                    break;
                }
            };

            if response.tool_calls.is_empty() {
                debug!(steps, "Research agent finished without further tool calls");
                break;
            }

            messages.push(LLMMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in response.tool_calls {
                if steps >= self.settings.max_steps {
                    break 'conversation;
                }
                steps += 1;

                let output = self.dispatch(&call, breadth, filters, &mut filter).await;
                messages.push(LLMMessage::tool_result(call.id, output));
            }
        }

        if filter.pending_len() > 0 {
            debug!(
                abandoned = filter.pending_len(),
                "Pending results left unevaluated at end of loop"
            );
        }

        let accepted = filter.into_accepted();
        info!(query = %query, steps, accepted = accepted.len(), "Search and filter complete");
        accepted
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        breadth: usize,
        filters: &SearchFilters,
        filter: &mut RelevanceFilter<'_>,
    ) -> String {
        match call.name.as_str() {
            SEARCH_TOOL => self.run_search(&call.arguments, breadth, filters, filter).await,
            EVALUATE_TOOL => filter.evaluate().await.hint().to_string(),
            other => format!("Unknown tool: {}", other),
        }
    }

    async fn run_search(
        &self,
        arguments: &serde_json::Value,
        breadth: usize,
        filters: &SearchFilters,
        filter: &mut RelevanceFilter<'_>,
    ) -> String {
        let args: SearchWebArgs = match serde_json::from_value(arguments.clone()) {
            Ok(args) => args,
            Err(e) => return format!("Invalid arguments for {}: {}", SEARCH_TOOL, e),
        };
        if args.query.trim().is_empty() {
            return format!("Invalid arguments for {}: query must not be empty", SEARCH_TOOL);
        }

        let request = SearchRequest {
            query: args.query.trim().to_string(),
            num_results: breadth,
            filters: filters.clone(),
        };

        let results = match with_timeout(self.settings.call_timeout, "web search", async {
            self.search.search(&request).await.map_err(AppError::from)
        })
        .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, query = %request.query, "searchWeb tool failed");
                return format!("Search failed: {}", e);
            }
        };

        let listing = Self::preview(&results);
        filter.push_pending(results);
        listing
    }

    fn preview(results: &[SearchResult]) -> String {
        let mut seen = HashSet::new();
        let hits: Vec<SearchHitPreview<'_>> = results
            .iter()
            .filter(|r| seen.insert(r.url.as_str()))
            .map(|r| SearchHitPreview {
                title: &r.title,
                url: &r.url,
                published_date: r.published_date.as_deref(),
                content: r.content.chars().take(PREVIEW_CHARS).collect(),
            })
            .collect();
        serde_json::to_string(&hits).unwrap_or_else(|_| "[]".to_string())
    }
}
