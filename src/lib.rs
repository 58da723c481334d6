// Deep Search - recursive web research with relevance filtering and report synthesis

pub mod config;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod search;     // Web search (Exa)
pub mod knowledge;  // Vector-store knowledge base
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::{AppState, Research};
pub use agents::{ResearchEngine, ResearchOptions, ResearchPipeline};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
