//! Request-boundary error taxonomy.
//!
//! Every failure on the request path converges on [`ApiError`] and is
//! converted to a structured `{status, message}` JSON response at the
//! boundary. Nothing here ever propagates as a process crash, and no
//! stack trace leaves the service.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Why a lifecycle transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Another session already activated this interview.
    AlreadyStarted,
    /// The interview already ran to completion; the link is spent.
    AlreadyCompleted,
    /// The link does not correspond to any known interview.
    LinkInvalid,
}

impl DenyReason {
    pub fn token(self) -> &'static str {
        match self {
            DenyReason::AlreadyStarted => "already_started",
            DenyReason::AlreadyCompleted => "already_completed",
            DenyReason::LinkInvalid => "link_invalid",
        }
    }

    fn message(self) -> &'static str {
        match self {
            DenyReason::AlreadyStarted => "Interview already in progress from another session",
            DenyReason::AlreadyCompleted => "Interview link already used",
            DenyReason::LinkInvalid => "Interview link is invalid",
        }
    }
}

/// The service-wide error taxonomy.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed request field; rejected before the store is touched.
    Validation(String),
    /// Lifecycle transition attempted from the wrong state.
    PreconditionFailed(DenyReason),
    /// Unknown interview or session id.
    NotFound(&'static str),
    /// External provider unavailable or rejecting requests.
    ExternalService { provider: &'static str, detail: String },
    /// External provider returned unparseable structured content. A
    /// contract violation, surfaced distinctly from unavailability.
    Parse(String),
    /// The record store is unreachable or failed.
    Persistence(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(detail) => write!(f, "validation failed: {}", detail),
            ApiError::PreconditionFailed(reason) => {
                write!(f, "precondition failed: {}", reason.token())
            }
            ApiError::NotFound(what) => write!(f, "{} not found", what),
            ApiError::ExternalService { provider, detail } => {
                write!(f, "{} error: {}", provider, detail)
            }
            ApiError::Parse(detail) => write!(f, "parse error: {}", detail),
            ApiError::Persistence(detail) => write!(f, "persistence error: {}", detail),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PreconditionFailed(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ExternalService { .. } | ApiError::Parse(_) => StatusCode::BAD_GATEWAY,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable token for the `status` field of the response body.
    pub fn token(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "invalid_request",
            ApiError::PreconditionFailed(reason) => reason.token(),
            ApiError::NotFound(_) => "not_found",
            ApiError::ExternalService { .. } => "external_service_error",
            ApiError::Parse(_) => "parse_error",
            ApiError::Persistence(_) => "persistence_error",
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(detail) => detail.clone(),
            ApiError::PreconditionFailed(reason) => reason.message().to_string(),
            ApiError::NotFound(what) => format!("{} not found", what),
            ApiError::ExternalService { provider, detail } => {
                format!("{} request failed: {}", provider, detail)
            }
            ApiError::Parse(detail) => detail.clone(),
            ApiError::Persistence(detail) => detail.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": self.token(),
            "message": self.public_message(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
