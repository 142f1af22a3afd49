//! Evaluation Requester — one multi-part model call per analysis.
//!
//! Request order is fixed: job description, page images in page order, instruction.
//! Failures never propagate: they come back as the result text.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::document::RenderedPage;
use crate::llm_client::prompts::{ATS_PROMPT, HR_PROMPT};
use crate::llm_client::{GeminiClient, LlmError, Part};

/// Which of the two fixed evaluations the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMode {
    #[serde(rename = "hr")]
    HrReview,
    #[serde(rename = "ats")]
    AtsMatch,
}

impl AnalysisMode {
    pub fn instruction(self) -> &'static str {
        match self {
            AnalysisMode::HrReview => HR_PROMPT,
            AnalysisMode::AtsMatch => ATS_PROMPT,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalysisMode::HrReview => "HR Review",
            AnalysisMode::AtsMatch => "ATS Match Score",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hr" => Ok(AnalysisMode::HrReview),
            "ats" => Ok(AnalysisMode::AtsMatch),
            other => Err(format!("unknown analysis mode '{other}' (expected 'hr' or 'ats')")),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything that goes into one model call.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub job_description: &'a str,
    pub pages: &'a [RenderedPage],
    pub instruction: &'static str,
}

impl<'a> EvaluationRequest<'a> {
    pub fn parts(&self) -> Vec<Part<'a>> {
        let mut parts = Vec::with_capacity(self.pages.len() + 2);
        parts.push(Part::text(self.job_description));
        parts.extend(
            self.pages
                .iter()
                .map(|page| Part::inline(page.mime_type, &page.data)),
        );
        parts.push(Part::text(self.instruction));
        parts
    }
}

/// Seam between the requester and the remote model, so tests can inject fakes.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &EvaluationRequest<'_>) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &EvaluationRequest<'_>) -> Result<String, LlmError> {
        GeminiClient::generate(self, &request.parts()).await
    }

    fn name(&self) -> &str {
        self.model()
    }
}

/// Model output, or the error text that replaced it. Both are shown and downloaded the same way.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub mode: AnalysisMode,
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Evaluator {
    model: Arc<dyn GenerativeModel>,
}

impl Evaluator {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Calls the model exactly once.
    pub async fn evaluate(
        &self,
        job_description: &str,
        pages: &[RenderedPage],
        mode: AnalysisMode,
    ) -> AnalysisResult {
        let request = EvaluationRequest {
            job_description,
            pages,
            instruction: mode.instruction(),
        };

        info!("Requesting {mode} for {} page(s)", pages.len());

        let text = match self.model.generate(&request).await {
            Ok(text) => text,
            Err(error) => {
                warn!("{mode} failed: {error}");
                format!("Gemini API error: {error}")
            }
        };

        AnalysisResult {
            mode,
            text,
            generated_at: Utc::now(),
        }
    }
}
