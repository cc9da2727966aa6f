use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// The closed error taxonomy shared by every stage of the pipeline.
///
/// Stages never throw these as exceptions — they return them as part of a
/// structured result (`success: false, error_type: ...`). Only the HTTP
/// boundary converts an unrecovered `ErrorType` into a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ValidationError,
    NoData,
    QuotaExceeded,
    Timeout,
    AreaTooLarge,
    ProcessingError,
    NerUnavailable,
    IntentUnavailable,
    BackendUnavailable,
}

impl ErrorType {
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::AreaTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::NoData => StatusCode::NOT_FOUND,
            // backend_unavailable degrades to search synthesis upstream; it should
            // never reach this mapping as a terminal error but is kept for completeness.
            Self::BackendUnavailable => StatusCode::OK,
            Self::ProcessingError | Self::NerUnavailable | Self::IntentUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::NoData => "no_data",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Timeout => "timeout",
            Self::AreaTooLarge => "area_too_large",
            Self::ProcessingError => "processing_error",
            Self::NerUnavailable => "ner_unavailable",
            Self::IntentUnavailable => "intent_unavailable",
            Self::BackendUnavailable => "backend_unavailable",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub error_type: &'static str,
}

/// Uniform error response for the one HTTP endpoint this crate exposes.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: ErrorType,
    pub message: String,
}

impl ApiError {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            status: error_type.status_code(),
            error_type,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ValidationError, message)
    }

    pub fn area_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorType::AreaTooLarge, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Timeout, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(ErrorType::NoData, message)
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorType::QuotaExceeded, message)
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ProcessingError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ProcessingError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            error_type: self.error_type.as_str(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.error_type.as_str(),
            self.status,
            self.message
        )
    }
}

impl std::error::Error for ApiError {}
