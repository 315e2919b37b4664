//! Analysis API routes
//!
//! `POST /analyze` runs (or serves from cache) the full analysis for a ticker.

use analysis_core::Ticker;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::time::Instant;

use crate::request_id::RequestId;
use crate::{AppError, AppState};

pub static X_ANALYSIS_CACHE: HeaderName = HeaderName::from_static("x-analysis-cache");
pub static X_ANALYSIS_DURATION_MS: HeaderName = HeaderName::from_static("x-analysis-duration-ms");

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Validated separately so a bad symbol reports the symbol rules
    pub ticker: String,
    #[serde(default)]
    pub force_refresh: bool,
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}

async fn analyze(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body?;
    let ticker = Ticker::parse(&request.ticker)?;

    let started = Instant::now();
    let outcome = state.orchestrator.analyze(&ticker, request.force_refresh).await?;
    let duration_ms = started.elapsed().as_millis() as u64;

    tracing::info!(
        request_id = request_id.as_ref().map(|Extension(id)| id.0.as_str()).unwrap_or("-"),
        "Analyzed {} in {}ms (cache {})",
        ticker,
        duration_ms,
        outcome.cache.as_str()
    );

    let mut response = Json(outcome.result.as_ref()).into_response();
    let headers = response.headers_mut();
    headers.insert(X_ANALYSIS_CACHE.clone(), HeaderValue::from_static(outcome.cache.as_str()));
    headers.insert(X_ANALYSIS_DURATION_MS.clone(), HeaderValue::from(duration_ms));
    Ok(response)
}
