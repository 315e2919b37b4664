use analysis_core::{AnalysisError, SummaryPayload, Summarizer};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{LlmError, LlmResult};

/// JSON shapes accepted from the summarization endpoint
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Summarizer backed by a remote text-generation endpoint.
///
/// The endpoint receives the assembled analysis payload as JSON and answers
/// with `{"summary": "..."}`, `{"text": "..."}`, `{"content": "..."}` or a
/// plain-text body.
#[derive(Clone)]
pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSummarizer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> LlmResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_summary(&self, payload: &SummaryPayload<'_>) -> LlmResult<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { LlmError::Timeout } else { LlmError::RequestFailed(e) })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| if e.is_timeout() { LlmError::Timeout } else { LlmError::RequestFailed(e) })?;

        check_status(status, &body)?;
        parse_summary(&body)
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, payload: &SummaryPayload<'_>) -> Result<String, AnalysisError> {
        tracing::debug!("Requesting summary for {} from {}", payload.ticker, self.endpoint);
        self.request_summary(payload).await.map_err(|e| {
            tracing::warn!("Summarization failed for {}: {}", payload.ticker, e);
            AnalysisError::from(e)
        })
    }
}

/// Quota and billing responses are reported separately from outages.
fn check_status(status: StatusCode, body: &str) -> LlmResult<()> {
    if status.is_success() {
        return Ok(());
    }
    let detail = body.chars().take(200).collect::<String>();
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => Err(LlmError::QuotaExceeded(format!(
            "Summarization service returned {}: {}",
            status, detail
        ))),
        _ => Err(LlmError::ServiceUnavailable(format!(
            "Summarization service returned {}: {}",
            status, detail
        ))),
    }
}

fn parse_summary(body: &str) -> LlmResult<String> {
    let text = match serde_json::from_str::<SummaryResponse>(body) {
        Ok(parsed) => parsed
            .summary
            .or(parsed.text)
            .or(parsed.content)
            .ok_or_else(|| LlmError::InvalidResponse("No summary field in response".to_string()))?,
        // Not a JSON object: treat the body as the summary itself
        Err(_) => body.to_string(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::InvalidResponse("Empty summary".to_string()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary_shapes() {
        assert_eq!(parse_summary(r#"{"summary":"Solid cash flow."}"#).unwrap(), "Solid cash flow.");
        assert_eq!(parse_summary(r#"{"text":" Hold. "}"#).unwrap(), "Hold.");
        assert_eq!(parse_summary(r#"{"content":"Buy."}"#).unwrap(), "Buy.");
        assert_eq!(parse_summary("Plain narrative").unwrap(), "Plain narrative");
    }

    #[test]
    fn test_parse_summary_rejects_empty() {
        assert!(matches!(parse_summary("   "), Err(LlmError::InvalidResponse(_))));
        assert!(matches!(parse_summary(r#"{"other":1}"#), Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_status_classification() {
        assert!(check_status(StatusCode::OK, "").is_ok());
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Err(LlmError::QuotaExceeded(_))
        ));
        assert!(matches!(
            check_status(StatusCode::PAYMENT_REQUIRED, ""),
            Err(LlmError::QuotaExceeded(_))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, ""),
            Err(LlmError::ServiceUnavailable(_))
        ));
    }
}
