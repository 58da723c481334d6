//! Research Engine
//!
//! Recursive, depth- and breadth-bounded expansion of a research prompt.
//! Each level plans queries, searches and filters, optionally consults the
//! knowledge base, extracts a learning per accepted page and recurses on a
//! follow-up prompt built from that learning. One [`Research`] is threaded by
//! `&mut` through every branch, so later branches see what earlier ones
//! accepted.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agents::learning::LearningExtractor;
use crate::agents::planning::QueryPlanner;
use crate::agents::relevance::SearchAgent;
use crate::knowledge::KnowledgeAugmenter;
use crate::models::Research;
use crate::search::SearchFilters;
use crate::types::{AppError, AppResult};

/// Per-run inputs that stay fixed across every recursion level
#[derive(Debug, Clone, Default)]
pub struct ResearchOptions {
    pub filters: SearchFilters,
    /// One topic per depth level, outermost first
    pub focus_topics: Vec<String>,
    pub knowledge_base_id: Option<String>,
}

impl ResearchOptions {
    fn knowledge_store(&self) -> Option<&str> {
        self.knowledge_base_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Clone)]
pub struct ResearchEngine {
    planner: QueryPlanner,
    agent: SearchAgent,
    extractor: LearningExtractor,
    knowledge: KnowledgeAugmenter,
}

impl ResearchEngine {
    pub fn new(
        planner: QueryPlanner,
        agent: SearchAgent,
        extractor: LearningExtractor,
        knowledge: KnowledgeAugmenter,
    ) -> Self {
        Self {
            planner,
            agent,
            extractor,
            knowledge,
        }
    }

    /// Runs a fresh investigation and returns the populated aggregate
    pub async fn run_deep_research(
        &self,
        options: &ResearchOptions,
        prompt: &str,
        depth: u32,
        breadth: usize,
    ) -> AppResult<Research> {
        let mut research = Research::new();
        self.run(options, prompt, depth, breadth, &mut research).await?;
        Ok(research)
    }

    /// Expands `prompt` into `research`.
    ///
    /// A planning failure at this level is returned. Failures inside nested
    /// levels are logged and that sub-branch is dropped; anything already
    /// recorded stays in `research`.
    pub async fn run(
        &self,
        options: &ResearchOptions,
        prompt: &str,
        depth: u32,
        breadth: usize,
        research: &mut Research,
    ) -> AppResult<()> {
        if breadth == 0 {
            return Err(AppError::InvalidRequest(
                "breadth must be at least 1".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("research", %run_id);

        async move {
            info!(depth, breadth, focus = options.focus_topics.len(), "Starting deep research");
            self.expand(options, prompt.to_string(), depth, breadth, research)
                .await?;
            info!(
                queries = research.queries.len(),
                results = research.search_results.len(),
                learnings = research.learnings.len(),
                "Deep research complete"
            );
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn expand<'a>(
        &'a self,
        options: &'a ResearchOptions,
        prompt: String,
        depth: u32,
        breadth: usize,
        research: &'a mut Research,
    ) -> BoxFuture<'a, AppResult<()>> {
        async move {
            research.set_root_once(&prompt);
            if depth == 0 {
                return Ok(());
            }

            let effective_prompt = focused_prompt(&prompt, &options.focus_topics, depth);
            let queries = self.planner.plan(&effective_prompt, breadth).await?;
            research.record_queries(&queries);
            info!(depth, breadth, planned = queries.len(), "Level planned");

            for query in &queries {
                let accepted = self
                    .agent
                    .search_and_filter(query, breadth, &options.filters, &research.search_results)
                    .await;
                research.record_search_results(&accepted);

                if let Some(store_id) = options.knowledge_store() {
                    let answer = self.knowledge.lookup(query, store_id).await;
                    research.record_knowledge(answer);
                }

                for result in &accepted {
                    let learning = match self.extractor.extract(query, result).await {
                        Ok(learning) => learning,
                        Err(e) => {
                            warn!(error = %e, url = %result.url, "Skipping result after extraction failure");
                            continue;
                        }
                    };

                    let follow_ups = learning.follow_up_questions.clone();
                    research.record_learning(query, learning);

                    let next_prompt =
                        follow_up_prompt(research.root(), &research.completed_queries, &follow_ups);

                    if let Err(e) = self
                        .expand(
                            options,
                            next_prompt,
                            depth - 1,
                            next_breadth(breadth),
                            research,
                        )
                        .await
                    {
                        warn!(error = %e, depth = depth - 1, "Nested research branch failed");
                    }
                }
            }

            Ok(())
        }
        .boxed()
    }
}

/// Binds the focus topic for this level, if any. Index is `len - depth`.
pub fn focused_prompt(prompt: &str, focus_topics: &[String], depth: u32) -> String {
    let index = focus_topics.len() as i64 - i64::from(depth);
    match usize::try_from(index).ok().and_then(|i| focus_topics.get(i)) {
        Some(topic) => format!(
            "{}, focus on these important branches of thought: {}",
            prompt, topic
        ),
        None => prompt.to_string(),
    }
}

/// Halve rounding up, never below 1
pub fn next_breadth(breadth: usize) -> usize {
    breadth.div_ceil(2).max(1)
}

pub fn follow_up_prompt(root: &str, completed: &[String], follow_ups: &[String]) -> String {
    format!(
        "Overall research goal: {}\nPrevious search queries: {}\nFollow-up questions: {}",
        root,
        completed.join(", "),
        follow_ups.join(", ")
    )
}
