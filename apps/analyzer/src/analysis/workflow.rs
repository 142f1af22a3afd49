//! The guarded interaction: validate, then evaluate.
//!
//! Checks run only when an analysis is triggered, in this order:
//! 1. job description present
//! 2. resume rendered
//!
//! A failed check makes no model call.

use tracing::warn;

use crate::analysis::evaluator::{AnalysisMode, AnalysisResult, Evaluator};
use crate::analysis::session::AnalysisSession;
use crate::errors::AppError;

pub const MISSING_JOB_DESCRIPTION: &str = "Please enter a job description before analyzing.";
pub const MISSING_RESUME: &str = "Please upload a resume PDF.";

pub async fn run_analysis(
    evaluator: &Evaluator,
    session: &AnalysisSession,
    mode: AnalysisMode,
) -> Result<AnalysisResult, AppError> {
    if session.job_description.trim().is_empty() {
        warn!("{mode} requested without a job description");
        return Err(AppError::Validation(MISSING_JOB_DESCRIPTION.to_string()));
    }

    let Some(resume) = session.resume.as_deref() else {
        warn!("{mode} requested without a rendered resume");
        return Err(AppError::Validation(MISSING_RESUME.to_string()));
    };

    Ok(evaluator
        .evaluate(&session.job_description, resume.pages(), mode)
        .await)
}
