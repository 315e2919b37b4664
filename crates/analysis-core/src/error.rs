use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream format error: {0}")]
    UpstreamFormat(String),

    #[error("Upstream quota exceeded: {0}")]
    UpstreamQuotaExceeded(String),
}

impl AnalysisError {
    /// Stable tag reported to callers in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Validation(_) => "ValidationError",
            AnalysisError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            AnalysisError::UpstreamFormat(_) => "UpstreamFormatError",
            AnalysisError::UpstreamQuotaExceeded(_) => "UpstreamQuotaExceeded",
        }
    }

    /// Message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            AnalysisError::Validation(m)
            | AnalysisError::UpstreamUnavailable(m)
            | AnalysisError::UpstreamFormat(m)
            | AnalysisError::UpstreamQuotaExceeded(m) => m,
        }
    }
}
