//! Report Synthesizer
//!
//! Turns the finished research aggregate into the final prose report. This is
//! the last step of the pipeline and uses its own (usually larger) model.

use std::time::Duration;
use tracing::{error, info};

use crate::llm::LLM;
use crate::models::Research;
use crate::types::{AppError, AppResult};
use crate::utils::with_timeout;

#[derive(Clone)]
pub struct ReportSynthesizer {
    llm: LLM,
    timeout: Duration,
}

impl ReportSynthesizer {
    pub fn new(llm: LLM, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn synthesize(&self, research: &Research, system_prompt: &str) -> AppResult<String> {
        info!(
            model = %self.llm.model(),
            learnings = research.learnings.len(),
            sources = research.search_results.len(),
            "Synthesizing report"
        );

        let prompt = Self::create_report_prompt(research)?;
        let report = with_timeout(
            self.timeout,
            "report synthesis",
            self.llm.generate_text(Some(system_prompt), &prompt),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Report generation failed");
            AppError::Synthesis(e.to_string())
        })?;

        if report.trim().is_empty() {
            return Err(AppError::Synthesis("model returned an empty report".to_string()));
        }

        info!(report_len = report.len(), "Report generated");
        Ok(report)
    }

    fn create_report_prompt(research: &Research) -> AppResult<String> {
        let data = serde_json::to_string_pretty(research)
            .map_err(|e| AppError::Synthesis(e.to_string()))?;
        Ok(format!(
            "Use the following structured research data to generate a detailed expert report:\n\n{}",
            data
        ))
    }
}
