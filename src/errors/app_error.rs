use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use super::voice_error::VoiceError;
use crate::core::listings::SearchError;
use crate::core::nlu::NluError;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Voice session error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Text assistant error: {0}")]
    Assistant(#[from] NluError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Voice(VoiceError::MissingApiKey | VoiceError::Config(_)) => {
                StatusCode::PRECONDITION_FAILED
            }
            AppError::Voice(VoiceError::Permission) => StatusCode::FORBIDDEN,
            AppError::Voice(VoiceError::Cancelled) => StatusCode::CONFLICT,
            AppError::Voice(VoiceError::Connect(_) | VoiceError::ConnectionLost(_)) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Voice(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Assistant(NluError::MissingApiKey) => StatusCode::PRECONDITION_FAILED,
            AppError::Assistant(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // user-facing status line only, details go to the log
            AppError::Voice(err) => {
                tracing::warn!("Voice request failed: {}", err);
                err.user_message().to_string()
            }
            AppError::Assistant(err) => {
                tracing::warn!("Text request failed: {}", err);
                err.user_message().to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::BadRequest(msg) | AppError::ServiceUnavailable(msg) => msg.clone(),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            SearchError::InvalidData(msg) => AppError::Internal(msg),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Voice(VoiceError::MissingApiKey).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            AppError::Voice(VoiceError::Permission).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Voice(VoiceError::Cancelled).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(NluError::MissingApiKey).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            AppError::from(NluError::EmptyResponse).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(SearchError::Unavailable("down".to_string())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_response_hides_details() {
        let response = AppError::Voice(VoiceError::ConnectionLost(
            "tls handshake eof".to_string(),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
