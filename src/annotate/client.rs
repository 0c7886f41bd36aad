//! Annotation service trait and error types

use std::time::Duration;

use async_trait::async_trait;

/// Stateless annotation service - each call is independent
#[async_trait]
pub trait Annotator: Send + Sync {
    /// Produce the annotation (translation) for `text`
    async fn annotate(&self, text: &str, target_language: &str) -> Result<String, AnnotateError>;

    /// Short name for diagnostics
    fn name(&self) -> &str;
}

/// Errors that can occur while producing an annotation
#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("Text to annotate is empty")]
    EmptyText,

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Annotation service unavailable: {0}")]
    Unavailable(String),
}

impl AnnotateError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AnnotateError::RateLimited { .. })
    }

    /// Whether a caller with a retry policy could try again.
    /// The scheduler itself attempts each task exactly once.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnnotateError::RateLimited { .. } => true,
            AnnotateError::Api { status, .. } => *status >= 500,
            AnnotateError::Network(_) => true,
            AnnotateError::Unavailable(_) => true,
            AnnotateError::EmptyText => false,
            AnnotateError::InvalidResponse(_) => false,
            AnnotateError::Json(_) => false,
            AnnotateError::MissingApiKey { .. } => false,
        }
    }
}

/// Human-readable language name used in prompts
pub fn language_display_name(code: &str) -> &str {
    match code {
        "zh-CN" => "简体中文",
        other => other,
    }
}
