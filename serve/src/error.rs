//! The error envelope every non-2xx response carries:
//! `{error, code?, message?}`. Raw error detail is logged, never returned —
//! `message` is always a sanitised, user-safe string.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// The four recognised machine-readable codes, plus validation/auth/internal
/// errors that carry no code at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    CapacityLimit,
    StalePipeline,
    FeatureNotAvailable,
    BenchmarkRebuildConfirmRequired,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CapacityLimit => "CAPACITY_LIMIT",
            ErrorCode::StalePipeline => "STALE_PIPELINE",
            ErrorCode::FeatureNotAvailable => "FEATURE_NOT_AVAILABLE",
            ErrorCode::BenchmarkRebuildConfirmRequired => "BENCHMARK_REBUILD_CONFIRM_REQUIRED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    /// Missing/invalid auth or non-owner access. Collapsed to the same
    /// response as "not found" so a caller can't distinguish "not yours"
    /// from "doesn't exist" and enumerate other users' sessions.
    #[error("not found or not authorized")]
    NotFoundOrForbidden,
    #[error("feature not available: {0}")]
    FeatureNotAvailable(String),
    #[error("capacity limit reached")]
    CapacityLimit,
    #[error("pipeline is stale")]
    StalePipeline,
    #[error("benchmark rebuild confirmation required")]
    BenchmarkRebuildConfirmRequired,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
            ApiError::FeatureNotAvailable(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::CapacityLimit => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::StalePipeline => StatusCode::CONFLICT,
            ApiError::BenchmarkRebuildConfirmRequired => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::CapacityLimit => Some(ErrorCode::CapacityLimit.as_str()),
            ApiError::StalePipeline => Some(ErrorCode::StalePipeline.as_str()),
            ApiError::FeatureNotAvailable(_) => Some(ErrorCode::FeatureNotAvailable.as_str()),
            ApiError::BenchmarkRebuildConfirmRequired => {
                Some(ErrorCode::BenchmarkRebuildConfirmRequired.as_str())
            }
            _ => None,
        }
    }

    /// A sanitised message safe to show a client. Internal errors are logged
    /// with full detail and never surface their raw text here.
    fn user_message(&self) -> Option<String> {
        match self {
            ApiError::Internal(_) => None,
            ApiError::Validation(msg) => Some(msg.clone()),
            ApiError::FeatureNotAvailable(feature) => Some(feature.clone()),
            _ => Some(self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        }
        let status = self.status();
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("error").to_string(),
            code: self.code(),
            message: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<pipeline::PipelineStateError> for ApiError {
    fn from(err: pipeline::PipelineStateError) -> Self {
        match err {
            pipeline::PipelineStateError::NotFound(_) => ApiError::NotFoundOrForbidden,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<pipeline::AdmissionError> for ApiError {
    fn from(err: pipeline::AdmissionError) -> Self {
        match err {
            pipeline::AdmissionError::NotOwner => ApiError::NotFoundOrForbidden,
            pipeline::AdmissionError::CapacityLimit => ApiError::CapacityLimit,
        }
    }
}

impl From<pipeline::GateError> for ApiError {
    fn from(err: pipeline::GateError) -> Self {
        match err {
            pipeline::GateError::NotFound(_) => ApiError::NotFoundOrForbidden,
            pipeline::GateError::Stale => ApiError::StalePipeline,
            pipeline::GateError::NameMismatch { .. } => ApiError::Validation(err.to_string()),
            pipeline::GateError::State(e) => e.into(),
        }
    }
}

impl From<pipeline::FanoutError> for ApiError {
    fn from(err: pipeline::FanoutError) -> Self {
        match err {
            pipeline::FanoutError::NotFound(_) => ApiError::NotFoundOrForbidden,
            pipeline::FanoutError::GlobalCapacity | pipeline::FanoutError::UserCapacity => {
                ApiError::CapacityLimit
            }
        }
    }
}

impl From<pipeline::CoordinatorError> for ApiError {
    fn from(err: pipeline::CoordinatorError) -> Self {
        match err {
            pipeline::CoordinatorError::BenchmarkRebuildConfirmRequired => {
                ApiError::BenchmarkRebuildConfirmRequired
            }
            pipeline::CoordinatorError::State(e) => e.into(),
            pipeline::CoordinatorError::Agent(e) => ApiError::Internal(e.to_string()),
        }
    }
}
