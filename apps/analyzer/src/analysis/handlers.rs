//! Axum route handlers: the HTML page, the download, and the one-shot JSON API.

use askama::Template;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::analysis::document::{DocumentRenderer, RenderError};
use crate::analysis::evaluator::AnalysisMode;
use crate::analysis::session::AnalysisSession;
use crate::analysis::views::{IndexPage, Notice, DOWNLOAD_FILE_NAME};
use crate::analysis::workflow::{run_analysis, MISSING_RESUME};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Form decoding
// ────────────────────────────────────────────────────────────────────────────

/// Fields shared by the page form and the JSON API. Unknown fields are ignored.
#[derive(Debug, Default)]
struct AnalysisForm {
    session_id: Option<Uuid>,
    job_description: Option<String>,
    resume: Option<Bytes>,
    action: Option<String>,
}

fn malformed(e: MultipartError) -> AppError {
    AppError::Validation(format!("Malformed form data: {e}"))
}

async fn read_form(mut multipart: Multipart) -> Result<AnalysisForm, AppError> {
    let mut form = AnalysisForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "session_id" => {
                form.session_id = field.text().await.map_err(malformed)?.trim().parse().ok();
            }
            "job_description" => {
                form.job_description = Some(field.text().await.map_err(malformed)?);
            }
            "resume" => {
                // Browsers send an empty, unnamed part when no file was picked.
                let data = field.bytes().await.map_err(malformed)?;
                if !data.is_empty() {
                    form.resume = Some(data);
                }
            }
            "action" | "mode" => {
                form.action = Some(field.text().await.map_err(malformed)?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Renders an upload into the session. On failure the session is left not ready.
/// Any earlier result belonged to the previous resume and is dropped either way.
async fn apply_upload(
    renderer: &DocumentRenderer,
    session: &mut AnalysisSession,
    pdf: Bytes,
) -> Notice {
    session.last_result = None;
    match renderer.render(pdf).await {
        Ok(resume) => {
            session.attach_resume(resume);
            Notice::success("Resume uploaded!")
        }
        Err(e) => {
            session.clear_resume();
            Notice::error(AppError::Render(e).to_string())
        }
    }
}

fn render_page(
    state: &AppState,
    session_id: Uuid,
    session: &AnalysisSession,
    notices: Vec<Notice>,
) -> Result<Html<String>, AppError> {
    let page = IndexPage::new(session_id, session, notices, state.evaluator.model_name())?;
    Ok(Html(page.render()?))
}

// ────────────────────────────────────────────────────────────────────────────
// Page handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /
pub async fn handle_index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let (session_id, session) = state.sessions.load(None).await;
    render_page(&state, session_id, &session, Vec::new())
}

/// POST /resume
///
/// Renders the uploaded PDF and shows the first-page preview.
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let form = read_form(multipart).await?;
    let (session_id, mut session) = state.sessions.load(form.session_id).await;
    if let Some(job_description) = form.job_description {
        session.job_description = job_description;
    }

    let notice = match form.resume {
        Some(pdf) => apply_upload(&state.renderer, &mut session, pdf).await,
        None => Notice::warning(MISSING_RESUME),
    };

    let page = render_page(&state, session_id, &session, vec![notice]);
    state.sessions.save(session_id, session).await;
    page
}

/// POST /analyze
///
/// Picks up a freshly selected file first, then runs the guarded evaluation.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let form = read_form(multipart).await?;
    let (session_id, mut session) = state.sessions.load(form.session_id).await;
    if let Some(job_description) = form.job_description {
        session.job_description = job_description;
    }
    // Only a successful evaluation of this click leaves a result behind.
    session.last_result = None;

    let mut notices = Vec::new();
    if let Some(pdf) = form.resume {
        notices.push(apply_upload(&state.renderer, &mut session, pdf).await);
    }

    match form.action.as_deref().unwrap_or_default().parse::<AnalysisMode>() {
        Ok(mode) => match run_analysis(&state.evaluator, &session, mode).await {
            Ok(result) => session.last_result = Some(result),
            Err(AppError::Validation(message)) => notices.push(Notice::warning(message)),
            Err(e) => return Err(e),
        },
        Err(message) => notices.push(Notice::warning(message)),
    }

    let page = render_page(&state, session_id, &session, notices);
    state.sessions.save(session_id, session).await;
    page
}

/// GET /download/:session_id
///
/// The latest result as a plain-text attachment, byte-for-byte what was displayed.
pub async fn handle_download(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .sessions
        .get(session_id)
        .await
        .and_then(|session| session.last_result)
        .ok_or_else(|| AppError::NotFound("No analysis result to download".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        result.text,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// JSON API
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub mode: AnalysisMode,
    pub result: String,
    pub page_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// POST /api/v1/analyze
///
/// Multipart `job_description`, `mode` (`hr` | `ats`), `resume` in one shot. Nothing is kept.
pub async fn handle_analyze_api(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let form = read_form(multipart).await?;

    let mode = form
        .action
        .as_deref()
        .ok_or_else(|| AppError::Validation("mode is required ('hr' or 'ats')".to_string()))?
        .parse::<AnalysisMode>()
        .map_err(AppError::Validation)?;

    let mut session = AnalysisSession {
        job_description: form.job_description.unwrap_or_default(),
        ..Default::default()
    };
    if let Some(pdf) = form.resume {
        let resume = state.renderer.render(pdf).await.map_err(|e| match e {
            RenderError::WorkerUnavailable => AppError::Internal(e.into()),
            other => AppError::Render(other),
        })?;
        session.attach_resume(resume);
    }

    let result = run_analysis(&state.evaluator, &session, mode).await?;
    info!("API {} completed", result.mode);

    Ok(Json(AnalyzeResponse {
        mode: result.mode,
        result: result.text,
        page_count: session.pages().len(),
        generated_at: result.generated_at,
    }))
}
