use thiserror::Error;

/// Core internal error type shared across the workspace.
///
/// Every fallible boundary (config, vector backend, graph backend, embedding
/// provider, plan validation, io) maps onto one of these variants.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde_json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid parameter: {0}")]
    InvalidParameters(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// True when this error is safe to retry (e.g. a transient backend or
    /// tool-execution failure), false when it reflects a caller mistake that
    /// retrying would not fix.
    #[must_use]
    pub fn retry_possible(&self) -> bool {
        !matches!(self, AppError::Validation(_) | AppError::InvalidParameters(_) | AppError::NotFound(_))
    }

    /// The step-level error-type label this error maps onto when a tool's
    /// [`crate::error`]-returning `validate` fails (spec.md §7): the default
    /// required-parameter check reports `MissingParameters`, while a tool's
    /// own stricter checks (e.g. "attachments must be a list of file paths")
    /// report `InvalidParameters` by returning this variant.
    #[must_use]
    pub fn validation_error_type(&self) -> &'static str {
        match self {
            AppError::InvalidParameters(_) => "InvalidParameters",
            _ => "MissingParameters",
        }
    }
}
