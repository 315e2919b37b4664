use analysis_core::AnalysisError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error returned by handlers; renders `{"success": false, "error": {kind, message}}`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

/// HTTP status for each failure kind.
pub fn status_for(error: &AnalysisError) -> StatusCode {
    match error {
        AnalysisError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AnalysisError::UpstreamFormat(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::UpstreamQuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
    }
}

impl From<AnalysisError> for AppError {
    fn from(error: AnalysisError) -> Self {
        Self {
            status: status_for(&error),
            kind: error.kind(),
            message: error.message().to_string(),
        }
    }
}

/// Unreadable request bodies are validation failures like any other bad input.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AnalysisError::Validation(format!("Invalid request body: {}", rejection.body_text())).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("{} ({}): {}", self.status, self.kind, self.message);
        }

        let body = json!({
            "success": false,
            "error": {
                "kind": self.kind,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
