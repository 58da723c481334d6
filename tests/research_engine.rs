//! Integration tests for the recursive research engine, driven by scripted
//! stand-ins for the language model, the web search and the knowledge base.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deep_search::agents::{
    AgentSettings, DrainPolicy, LearningExtractor, QueryPlanner, ReportSynthesizer,
    ResearchEngine, ResearchOptions, ResearchPipeline, SearchAgent,
};
use deep_search::knowledge::{KnowledgeAugmenter, KnowledgeBase};
use deep_search::llm::{LLMAdapter, LLM};
use deep_search::models::{Research, SearchResult};
use deep_search::search::{SearchError, SearchFilters, SearchProvider, SearchRequest};
use deep_search::types::{
    AppError, AppResult, LLMRequest, LLMResponse, TokenUsage, ToolCall,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Behaviour {
    fail_all_planning: bool,
    fail_nested_planning: bool,
    irrelevant_urls: Vec<String>,
    failing_extractions: Vec<String>,
}

/// Plays every model role, keyed on the request shape
struct ScriptedModel {
    behaviour: Behaviour,
    planned: Mutex<Vec<(usize, String)>>,
    next_query: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            planned: Mutex::new(vec![]),
            next_query: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    fn planned_counts(&self) -> Vec<usize> {
        self.planned.lock().unwrap().iter().map(|(n, _)| *n).collect()
    }

    fn planned_topics(&self) -> Vec<String> {
        self.planned
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    fn plan(&self, prompt: &str) -> AppResult<String> {
        let rest = prompt.strip_prefix("Generate ").unwrap();
        let (count, topic) = rest
            .split_once(" search queries for the following query: ")
            .unwrap();
        let count: usize = count.parse().unwrap();
        self.planned.lock().unwrap().push((count, topic.to_string()));

        if self.behaviour.fail_all_planning
            || (self.behaviour.fail_nested_planning && topic.starts_with("Overall research goal"))
        {
            return Err(AppError::LLMApi("planner unavailable".to_string()));
        }

        let queries: Vec<String> = (0..count)
            .map(|_| format!("query {}", self.next_query.fetch_add(1, Ordering::SeqCst)))
            .collect();
        Ok(serde_json::json!({ "queries": queries }).to_string())
    }

    fn evaluate(&self, prompt: &str) -> AppResult<String> {
        let candidate: SearchResult = serde_json::from_str(between(
            prompt,
            "<search_results>",
            "</search_results>",
        ))
        .unwrap();
        let verdict = if self.behaviour.irrelevant_urls.contains(&candidate.url) {
            "irrelevant"
        } else {
            "relevant"
        };
        Ok(serde_json::json!({ "result": verdict }).to_string())
    }

    fn learn(&self, prompt: &str) -> AppResult<String> {
        let result: SearchResult =
            serde_json::from_str(between(prompt, "<search_result>", "</search_result>")).unwrap();
        if self.behaviour.failing_extractions.contains(&result.url) {
            return Err(AppError::LLMApi("extraction refused".to_string()));
        }
        Ok(serde_json::json!({
            "learning": format!("Finding from {}", result.url),
            "followUpQuestions": [format!("What else about {}?", result.title)]
        })
        .to_string())
    }

    fn report(&self, prompt: &str) -> AppResult<String> {
        let (_, data) = prompt.split_once("\n\n").unwrap();
        let research: serde_json::Value = serde_json::from_str(data).unwrap();
        Ok(format!(
            "# Report: {}\n\n{} learnings",
            research["query"].as_str().unwrap_or_default(),
            research["learnings"].as_array().map(Vec::len).unwrap_or(0)
        ))
    }

    /// searchWeb on the first turn, evaluate on the second, then stop
    fn drive(&self, request: &LLMRequest) -> Vec<ToolCall> {
        let tool_turns = request
            .messages
            .iter()
            .filter(|m| m.role == "tool")
            .count();
        match tool_turns {
            0 => {
                let opening = &request.messages[0].content;
                let query = between(opening, "information about ", ", For each item");
                vec![ToolCall {
                    id: "call_search".to_string(),
                    name: "searchWeb".to_string(),
                    arguments: serde_json::json!({ "query": query }),
                }]
            }
            1 => vec![ToolCall {
                id: "call_evaluate".to_string(),
                name: "evaluate".to_string(),
                arguments: serde_json::json!({}),
            }],
            _ => vec![],
        }
    }
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    text.split(start)
        .nth(1)
        .and_then(|s| s.split(end).next())
        .unwrap()
        .trim()
}

#[async_trait]
impl LLMAdapter for ScriptedModel {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !request.tools.is_empty() {
            return Ok(response(String::new(), self.drive(request)));
        }

        let prompt = &request.messages[0].content;
        let content = match request.response_format.as_ref().map(|f| f.name.as_str()) {
            Some("search_queries") => self.plan(prompt)?,
            Some("enum_choice") => self.evaluate(prompt)?,
            Some("learning") => self.learn(prompt)?,
            _ => self.report(prompt)?,
        };
        Ok(response(content, vec![]))
    }
}

fn response(content: String, tool_calls: Vec<ToolCall>) -> LLMResponse {
    LLMResponse {
        content,
        finish_reason: "stop".to_string(),
        usage: TokenUsage::default(),
        tool_calls,
    }
}

/// Returns `num_results` pages per query. With `shared_url` every page has the same URL.
#[derive(Default)]
struct FakeSearch {
    shared_url: Option<String>,
    requests: Mutex<Vec<SearchRequest>>,
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, SearchError> {
        self.requests.lock().unwrap().push(request.clone());
        let slug = request.query.replace(' ', "-");
        Ok((0..request.num_results)
            .map(|i| SearchResult {
                title: format!("{} #{}", request.query, i),
                url: self
                    .shared_url
                    .clone()
                    .unwrap_or_else(|| format!("https://news.example/{}/{}", slug, i)),
                content: "Solid electrolytes promise higher energy density.".to_string(),
                published_date: Some("2025-02-01".to_string()),
            })
            .collect())
    }
}

struct FakeKnowledge {
    fail: bool,
}

#[async_trait]
impl KnowledgeBase for FakeKnowledge {
    async fn answer_from_store(&self, query: &str, store_id: &str, _: &str) -> AppResult<String> {
        if self.fail {
            Err(AppError::KnowledgeBase("vector store offline".to_string()))
        } else {
            Ok(format!("{} says: {}", store_id, query))
        }
    }
}

fn engine(
    model: Arc<ScriptedModel>,
    search: Arc<FakeSearch>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    drain_policy: DrainPolicy,
) -> ResearchEngine {
    let llm = LLM::with_adapter(model, "openai", "gpt-4.1-mini");
    ResearchEngine::new(
        QueryPlanner::new(llm.clone(), TIMEOUT),
        SearchAgent::new(
            llm.clone(),
            search,
            AgentSettings {
                max_steps: 7,
                drain_policy,
                call_timeout: TIMEOUT,
            },
        ),
        LearningExtractor::new(llm, TIMEOUT),
        KnowledgeAugmenter::new(knowledge, "en", TIMEOUT),
    )
}

fn simple_engine(model: Arc<ScriptedModel>, search: Arc<FakeSearch>) -> ResearchEngine {
    engine(model, search, None, DrainPolicy::Latest)
}

#[tokio::test]
async fn depth_zero_only_sets_root() {
    let model = ScriptedModel::new(Behaviour::default());
    let engine = simple_engine(model.clone(), Arc::new(FakeSearch::default()));

    let mut research = Research::new();
    research.queries.push("earlier query".to_string());
    let before = research.clone();

    engine
        .run(&ResearchOptions::default(), "solid-state batteries", 0, 3, &mut research)
        .await
        .unwrap();

    assert_eq!(research.query.as_deref(), Some("solid-state batteries"));
    assert_eq!(research.queries, before.queries);
    assert!(research.search_results.is_empty());
    assert!(research.learnings.is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_breadth_is_rejected() {
    let model = ScriptedModel::new(Behaviour::default());
    let engine = simple_engine(model, Arc::new(FakeSearch::default()));

    let err = engine
        .run_deep_research(&ResearchOptions::default(), "p", 1, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

#[tokio::test]
async fn root_query_survives_recursion() {
    let model = ScriptedModel::new(Behaviour::default());
    let engine = simple_engine(model.clone(), Arc::new(FakeSearch::default()));

    let research = engine
        .run_deep_research(&ResearchOptions::default(), "state of solid-state batteries", 2, 2)
        .await
        .unwrap();

    assert_eq!(research.query.as_deref(), Some("state of solid-state batteries"));

    let topics = model.planned_topics();
    assert_eq!(topics[0], "state of solid-state batteries");
    assert!(topics.len() > 1);
    for nested in &topics[1..] {
        assert!(nested.starts_with("Overall research goal: state of solid-state batteries\n"));
    }
}

#[tokio::test]
async fn breadth_halves_rounding_up_per_level() {
    let model = ScriptedModel::new(Behaviour::default());
    let search = Arc::new(FakeSearch::default());
    let engine = simple_engine(model.clone(), search.clone());

    engine
        .run_deep_research(&ResearchOptions::default(), "batteries", 4, 5)
        .await
        .unwrap();

    let counts = model.planned_counts();
    assert_eq!(&counts[..4], &[5, 3, 2, 1]);
    assert!(counts.iter().all(|c| [5, 3, 2, 1].contains(c)));

    let per_search: HashSet<usize> = search
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.num_results)
        .collect();
    assert_eq!(per_search, HashSet::from([5, 3, 2, 1]));
}

#[tokio::test]
async fn completed_queries_track_each_learning() {
    let model = ScriptedModel::new(Behaviour {
        irrelevant_urls: vec!["https://news.example/query-0/1".to_string()],
        failing_extractions: vec!["https://news.example/query-1/2".to_string()],
        ..Behaviour::default()
    });
    let engine = engine(
        model,
        Arc::new(FakeSearch::default()),
        None,
        DrainPolicy::All,
    );

    let research = engine
        .run_deep_research(&ResearchOptions::default(), "batteries", 1, 3)
        .await
        .unwrap();

    // 3 queries x 3 pages, one rejected
    assert_eq!(research.queries.len(), 3);
    assert_eq!(research.search_results.len(), 8);
    // one accepted page fails extraction
    assert_eq!(research.learnings.len(), 7);
    assert_eq!(research.completed_queries.len(), research.learnings.len());
    assert_eq!(
        research
            .completed_queries
            .iter()
            .filter(|q| q.as_str() == "query 1")
            .count(),
        2
    );
}

#[tokio::test]
async fn duplicate_url_is_kept_once_across_branches() {
    let model = ScriptedModel::new(Behaviour::default());
    let search = Arc::new(FakeSearch {
        shared_url: Some("https://news.example/the-one-article".to_string()),
        ..FakeSearch::default()
    });
    let engine = simple_engine(model, search.clone());

    let research = engine
        .run_deep_research(&ResearchOptions::default(), "batteries", 2, 2)
        .await
        .unwrap();

    assert!(search.requests.lock().unwrap().len() > 1);
    assert_eq!(research.search_results.len(), 1);
    assert_eq!(research.learnings.len(), 1);
}

#[tokio::test]
async fn focus_topics_bind_outermost_first() {
    let model = ScriptedModel::new(Behaviour::default());
    let engine = simple_engine(model.clone(), Arc::new(FakeSearch::default()));
    let options = ResearchOptions {
        focus_topics: vec!["anode chemistry".to_string(), "battery recycling".to_string()],
        ..ResearchOptions::default()
    };

    engine
        .run_deep_research(&options, "solid-state batteries", 2, 1)
        .await
        .unwrap();

    let topics = model.planned_topics();
    assert_eq!(topics.len(), 2);
    assert_eq!(
        topics[0],
        "solid-state batteries, focus on these important branches of thought: anode chemistry"
    );
    assert!(topics[1].starts_with("Overall research goal: solid-state batteries\n"));
    assert!(topics[1]
        .ends_with(", focus on these important branches of thought: battery recycling"));
    assert!(!topics[1].contains("anode chemistry"));
}

#[tokio::test]
async fn knowledge_base_failure_records_empty_answer() {
    let model = ScriptedModel::new(Behaviour::default());
    let options = ResearchOptions {
        knowledge_base_id: Some("vs_internal".to_string()),
        ..ResearchOptions::default()
    };

    let failing = engine(
        model.clone(),
        Arc::new(FakeSearch::default()),
        Some(Arc::new(FakeKnowledge { fail: true })),
        DrainPolicy::Latest,
    );
    let research = failing
        .run_deep_research(&options, "batteries", 1, 2)
        .await
        .unwrap();
    assert_eq!(research.knowledge_base_results, vec!["", ""]);
    assert_eq!(research.learnings.len(), 2);

    let working = engine(
        model,
        Arc::new(FakeSearch::default()),
        Some(Arc::new(FakeKnowledge { fail: false })),
        DrainPolicy::Latest,
    );
    let research = working
        .run_deep_research(&options, "batteries", 1, 1)
        .await
        .unwrap();
    assert_eq!(research.knowledge_base_results.len(), 1);
    assert!(research.knowledge_base_results[0].starts_with("vs_internal says: query"));
}

#[tokio::test]
async fn knowledge_base_skipped_without_store_id() {
    let model = ScriptedModel::new(Behaviour::default());
    let engine = engine(
        model,
        Arc::new(FakeSearch::default()),
        Some(Arc::new(FakeKnowledge { fail: false })),
        DrainPolicy::Latest,
    );

    let research = engine
        .run_deep_research(&ResearchOptions::default(), "batteries", 1, 2)
        .await
        .unwrap();
    assert!(research.knowledge_base_results.is_empty());
}

#[tokio::test]
async fn nested_failure_does_not_abort_siblings() {
    let model = ScriptedModel::new(Behaviour {
        fail_nested_planning: true,
        ..Behaviour::default()
    });
    let engine = simple_engine(model.clone(), Arc::new(FakeSearch::default()));

    let research = engine
        .run_deep_research(&ResearchOptions::default(), "batteries", 2, 2)
        .await
        .unwrap();

    // both root queries still produced their learning
    assert_eq!(research.queries, vec!["query 0", "query 1"]);
    assert_eq!(research.learnings.len(), 2);
    // one nested planning attempt per learning
    assert_eq!(model.planned_counts(), vec![2, 1, 1]);
}

#[tokio::test]
async fn root_planning_failure_propagates() {
    let model = ScriptedModel::new(Behaviour {
        fail_all_planning: true,
        ..Behaviour::default()
    });
    let engine = simple_engine(model, Arc::new(FakeSearch::default()));

    let err = engine
        .run_deep_research(&ResearchOptions::default(), "batteries", 2, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Planning(_)));
}

#[tokio::test]
async fn end_to_end_solid_state_batteries() {
    let model = ScriptedModel::new(Behaviour::default());
    let search = Arc::new(FakeSearch::default());
    let engine = simple_engine(model.clone(), search.clone());
    let llm = LLM::with_adapter(model.clone(), "openai", "o3-mini");
    let pipeline = ResearchPipeline::new(engine, ReportSynthesizer::new(llm, TIMEOUT), "en");

    let options = ResearchOptions {
        filters: SearchFilters {
            include_domains: Some(vec!["nature.com".to_string()]),
            ..SearchFilters::default()
        },
        ..ResearchOptions::default()
    };

    let research = pipeline
        .engine()
        .run_deep_research(&options, "state of solid-state batteries", 1, 1)
        .await
        .unwrap();

    assert_eq!(research.queries.len(), 1);
    assert!(research.search_results.len() <= 1);
    assert!(research.learnings.len() <= 1);

    let requests = search.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].num_results, 1);
    assert_eq!(requests[0].filters, options.filters);

    let report = pipeline
        .report(&research, &options, None)
        .await
        .unwrap();
    assert!(!report.is_empty());
    assert!(report.contains("state of solid-state batteries"));

    let text = pipeline
        .execute(&options, "state of solid-state batteries", 1, 1, Some("Be brief."))
        .await
        .unwrap();
    assert!(text.starts_with("# Report: state of solid-state batteries"));
}
