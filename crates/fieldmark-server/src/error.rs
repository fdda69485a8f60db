use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] fieldmark_core::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Core(fieldmark_core::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Core(fieldmark_core::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(%status, error = %self, "Request failed");
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().timestamp_millis(),
        }));
        (status, body).into_response()
    }
}
