use thiserror::Error;

use crate::graph::RetrievalError;
use crate::llm::LlmError;
use crate::report::ReportStatus;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Invalid report id: {0:?}")]
    InvalidReportId(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
