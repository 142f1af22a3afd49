//! Server-rendered page for the single-page tool.

use askama::Template;
use uuid::Uuid;

use crate::analysis::evaluator::AnalysisResult;
use crate::analysis::session::AnalysisSession;
use crate::errors::AppError;

/// Fixed name of the downloadable result.
pub const DOWNLOAD_FILE_NAME: &str = "ats_resume_analysis.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self.level {
            NoticeLevel::Success => "notice success",
            NoticeLevel::Warning => "notice warning",
            NoticeLevel::Error => "notice error",
        }
    }
}

pub struct PreviewView {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub page_count: usize,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage<'a> {
    pub session_id: Uuid,
    pub job_description: &'a str,
    pub notices: Vec<Notice>,
    pub preview: Option<PreviewView>,
    pub result: Option<&'a AnalysisResult>,
    pub model_name: &'a str,
    pub download_file_name: &'static str,
}

impl<'a> IndexPage<'a> {
    pub fn new(
        session_id: Uuid,
        session: &'a AnalysisSession,
        notices: Vec<Notice>,
        model_name: &'a str,
    ) -> Result<Self, AppError> {
        let preview = match session.resume.as_deref() {
            Some(resume) => Some(PreviewView {
                data_uri: resume.preview().to_data_uri()?,
                width: resume.preview().width(),
                height: resume.preview().height(),
                page_count: resume.page_count(),
            }),
            None => None,
        };

        Ok(Self {
            session_id,
            job_description: &session.job_description,
            notices,
            preview,
            result: session.last_result.as_ref(),
            model_name,
            download_file_name: DOWNLOAD_FILE_NAME,
        })
    }
}
