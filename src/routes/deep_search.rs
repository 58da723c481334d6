use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use std::path::Path;
use tracing::{info, warn};
use validator::Validate;

use crate::agents::ResearchOptions;
use crate::models::{AppState, DeepSearchRequest, DeepSearchResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ai/deep-search", post(deep_search))
        .with_state(state)
}

async fn deep_search(
    State(state): State<AppState>,
    payload: Result<Json<DeepSearchRequest>, JsonRejection>,
) -> AppResult<Json<DeepSearchResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let depth = request.effective_depth();

    let options = ResearchOptions {
        filters: request.filters(),
        focus_topics: request.focus_topics(),
        knowledge_base_id: request.vector_store_id.clone(),
    };

    info!(
        depth,
        breadth = request.breadth,
        focus = options.focus_topics.len(),
        knowledge_base = options.knowledge_base_id.is_some(),
        "Received deep-search request"
    );

    let text = state
        .pipeline
        .execute(
            &options,
            &request.prompt,
            depth,
            request.breadth,
            request.system_prompt.as_deref(),
        )
        .await?;

    if let Some(path) = &state.config.research.report_output_path {
        persist_report(path, &text).await;
    }

    Ok(Json(DeepSearchResponse { text }))
}

/// Writes the report to disk. Failures are logged only.
pub async fn persist_report(path: &Path, text: &str) {
    match tokio::fs::write(path, text).await {
        Ok(()) => info!(path = %path.display(), "Report written"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write report"),
    }
}
