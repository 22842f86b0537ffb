//! Grading Engine: scores one resume against one job description.
//!
//! `Grader` tries the LLM first and degrades to `heuristic::heuristic_grade` on any
//! failure, so `grade` itself never fails. Carried in the pipeline as
//! `Arc<dyn GradingEngine>`.

pub mod heuristic;
pub mod prompts;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::extraction::{JobDescriptionData, ResumeData};
use crate::llm_client::{LlmClient, LlmError, LlmTransport};

/// Every grade carries exactly this many reasons.
pub const REASON_COUNT: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Output model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeSource {
    Llm,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub final_score: u8, // 0 – 100
    pub top_reasons: [String; REASON_COUNT],
    pub source: GradeSource,
}

impl GradeResult {
    /// Clamps the score, keeps the first three reasons and pads with `padding`.
    pub fn new(score: u8, reasons: Vec<String>, padding: &str, source: GradeSource) -> Self {
        let mut reasons = reasons.into_iter();
        let mut next = || reasons.next().unwrap_or_else(|| padding.to_string());
        Self {
            final_score: score.min(100),
            top_reasons: [next(), next(), next()],
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum GradingError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM call exceeded {0:?}")]
    Timeout(Duration),

    #[error("No JSON object in LLM response")]
    NoJson,

    #[error("Malformed JSON in LLM response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unexpected LLM response shape: {0}")]
    InvalidShape(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait GradingEngine: Send + Sync {
    async fn grade(&self, jd: &JobDescriptionData, resume: &ResumeData) -> GradeResult;
}

// ────────────────────────────────────────────────────────────────────────────
// Grader: LLM with heuristic fallback
// ────────────────────────────────────────────────────────────────────────────

pub struct Grader {
    llm: Option<Arc<dyn LlmTransport>>,
    /// Upper bound on one LLM grading call, retries included.
    deadline: Duration,
}

impl Grader {
    pub fn heuristic_only() -> Self {
        Self {
            llm: None,
            deadline: Duration::ZERO,
        }
    }

    pub fn with_llm(llm: Arc<dyn LlmTransport>, deadline: Duration) -> Self {
        Self {
            llm: Some(llm),
            deadline,
        }
    }

    /// Heuristic-only when no API key is configured or the client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Self {
        if !config.is_configured() {
            info!("LLM_API_KEY not set, grading with the heuristic only");
            return Self::heuristic_only();
        }
        match LlmClient::new(config) {
            Ok(client) => {
                info!("LLM grading enabled (model: {})", client.model());
                // Per-attempt timeout times attempts, plus backoff headroom.
                let deadline = config.timeout * (config.max_retries + 1)
                    + Duration::from_secs(2 * config.max_retries as u64);
                Self::with_llm(Arc::new(client), deadline)
            }
            Err(e) => {
                warn!("LLM client unavailable, grading with the heuristic only: {e}");
                Self::heuristic_only()
            }
        }
    }

    async fn grade_with_llm(
        &self,
        llm: &dyn LlmTransport,
        jd: &JobDescriptionData,
        resume: &ResumeData,
    ) -> Result<GradeResult, GradingError> {
        let prompt = prompts::build_grading_prompt(jd, resume);
        let text = tokio::time::timeout(self.deadline, llm.complete(&prompt, prompts::GRADING_SYSTEM))
            .await
            .map_err(|_| GradingError::Timeout(self.deadline))??;
        debug!("LLM grading reply: {} chars", text.len());
        response::parse_grading_response(&text)
    }
}

#[async_trait]
impl GradingEngine for Grader {
    async fn grade(&self, jd: &JobDescriptionData, resume: &ResumeData) -> GradeResult {
        let Some(llm) = &self.llm else {
            return heuristic::heuristic_grade(jd, resume);
        };
        match self.grade_with_llm(llm.as_ref(), jd, resume).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    candidate = %resume.name,
                    "LLM grading failed, using heuristic fallback: {e}"
                );
                heuristic::heuristic_grade(jd, resume)
            }
        }
    }
}
