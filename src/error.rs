use crate::classify::{self, FailureCategory};
use crate::input::InputError;
use crate::router::GenerationError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    ClientInput(#[from] InputError),

    #[error("서버 환경변수 {0}가 설정되어 있지 않습니다.")]
    Configuration(String),

    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },

    #[error("{0}")]
    Exhausted(String),

    #[error("{0}")]
    Unknown(String),
}

impl AppError {
    /// Sorts an orchestration failure into the rate-limited or exhausted
    /// bucket by re-classifying its final message.
    pub fn from_generation(err: GenerationError, retry_after_secs: u64) -> Self {
        let rate_limited = match &err {
            GenerationError::RateLimited(_) => true,
            GenerationError::Exhausted { .. } => classify::is_rate_limited(None, &err.to_string()),
        };
        if rate_limited {
            AppError::RateLimited {
                message: err.to_string(),
                retry_after_secs,
            }
        } else {
            AppError::Exhausted(err.to_string())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ClientInput(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_) | AppError::Exhausted(_) | AppError::Unknown(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn with_request_id(self, request_id: impl Into<String>) -> ApiError {
        ApiError {
            request_id: request_id.into(),
            error: self,
        }
    }
}

/// JSON error body. Optional fields are present only for the error kinds
/// that carry them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    received: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

/// An `AppError` tagged with the request it belongs to.
#[derive(Debug)]
pub struct ApiError {
    pub request_id: String,
    pub error: AppError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.as_str();
        let status = self.error.status();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            tracing::error!(request_id = %request_id, error = %self.error, "request failed");
        }

        let mut body = ErrorBody {
            error: self.error.to_string(),
            details: None,
            request_id,
            received: None,
            retry_after_seconds: None,
        };

        match &self.error {
            AppError::ClientInput(e) => body.received = e.received(),
            AppError::Configuration(_) => {}
            AppError::RateLimited {
                message,
                retry_after_secs,
            } => {
                body.error = FailureCategory::Quota.user_message().to_string();
                body.details = Some(message.as_str());
                body.retry_after_seconds = Some(*retry_after_secs);
                let retry_after = retry_after_secs.to_string();
                return (status, [(header::RETRY_AFTER, retry_after)], axum::Json(body))
                    .into_response();
            }
            AppError::Exhausted(message) | AppError::Unknown(message) => {
                body.error = classify::user_friendly_message(message).to_string();
                body.details = Some(message.as_str());
            }
        }

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelAttempt, Phase};
    use crate::provider::UpstreamError;

    #[test]
    fn test_generation_error_mapping() {
        let err = AppError::from_generation(
            GenerationError::RateLimited(UpstreamError::new("quota").with_status(429)),
            20,
        );
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let err = AppError::from_generation(
            GenerationError::Exhausted {
                last: "model not found".to_string(),
                attempts: vec![ModelAttempt {
                    model: "m".to_string(),
                    phase: Phase::SystemInstruction,
                    message: "model not found".to_string(),
                }],
            },
            20,
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("last=model not found"));
    }

    #[test]
    fn test_statuses() {
        assert_eq!(
            AppError::from(InputError::MissingName).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Configuration("GEMINI_API_KEY".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Configuration("GEMINI_API_KEY".into()).to_string(),
            "서버 환경변수 GEMINI_API_KEY가 설정되어 있지 않습니다."
        );
    }
}
