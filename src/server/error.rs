//! HTTP error mapping (C10): `ExamParseError` plus HTTP-only failure modes
//! → structured JSON response, grounded on `ktiyab-coheara::api::error::ApiError`.

use crate::error::ExamParseError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// HTTP-facing error: every [`ExamParseError`] plus failure modes that only
/// make sense at the HTTP boundary (missing API key, bad multipart body).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Parse(#[from] ExamParseError),
    #[error("missing or invalid API key")]
    Unauthorized,
    #[error("malformed multipart request: {0}")]
    BadMultipart(String),
    #[error("rate limit exceeded")]
    RateLimited { retry_after: u64 },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Parse(err) => (status_for(err), err.kind(), err.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", self.to_string()),
            ApiError::BadMultipart(_) => (StatusCode::BAD_REQUEST, "InputError", self.to_string()),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RateLimited", self.to_string()),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(%code, %message, "internal error");
        }

        let mut response = (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response();

        if let ApiError::Parse(ExamParseError::LlmQuotaError { .. }) = &self {
            response.headers_mut().insert("Retry-After", axum::http::HeaderValue::from_static("30"));
        }
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }

        response
    }
}

fn status_for(err: &ExamParseError) -> StatusCode {
    match err {
        ExamParseError::FileNotFound { .. }
        | ExamParseError::PermissionDenied { .. }
        | ExamParseError::NotAPdf { .. }
        | ExamParseError::EmptyDocument { .. }
        | ExamParseError::CorruptPdf { .. }
        | ExamParseError::PasswordRequired { .. }
        | ExamParseError::WrongPassword { .. }
        | ExamParseError::ConfigError { .. }
        | ExamParseError::SchemaError(_) => StatusCode::BAD_REQUEST,
        ExamParseError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ExamParseError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ExamParseError::JobNotFound(_) => StatusCode::NOT_FOUND,
        ExamParseError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
        ExamParseError::LlmQuotaError { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ExamParseError::LlmTransportError { .. } | ExamParseError::LlmFormatError { .. } => StatusCode::BAD_GATEWAY,
        ExamParseError::ParserInitError { .. } | ExamParseError::ParserRuntimeError { .. } | ExamParseError::AllPagesFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ExamParseError::ProviderNotConfigured { .. } | ExamParseError::InvalidConfig(_) | ExamParseError::PdfiumBindingFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ExamParseError::OutputWriteFailed { .. } | ExamParseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_maps_to_429() {
        let err = ApiError::Parse(ExamParseError::QueueFull { depth: 32, limit: 32 });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn job_not_found_maps_to_404() {
        let err = ApiError::Parse(ExamParseError::JobNotFound("abc".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn file_too_large_maps_to_413() {
        let err = ApiError::Parse(ExamParseError::FileTooLarge { size_mb: 80, limit_mb: 50 });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn quota_error_carries_retry_after() {
        let err = ApiError::Parse(ExamParseError::LlmQuotaError {
            provider: "gemini".to_string(),
            detail: "billing".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "30");
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
