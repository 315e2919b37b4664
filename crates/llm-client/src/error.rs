use analysis_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,
}

pub type LlmResult<T> = Result<T, LlmError>;

impl From<LlmError> for AnalysisError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::QuotaExceeded(msg) => AnalysisError::UpstreamQuotaExceeded(msg),
            other => AnalysisError::UpstreamUnavailable(format!("Summarization: {}", other)),
        }
    }
}
