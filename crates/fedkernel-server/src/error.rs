//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It
//! implements `axum::response::IntoResponse` to produce structured JSON
//! error responses with appropriate HTTP status codes. Conflicted is a
//! proposal status, never an error; these variants cover actual failures
//! plus the workflow preconditions that reject a request outright.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use fedkernel_core::CoreError;
use fedkernel_store::StorageError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "BUSY", "TARGET_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details (e.g., the offending fact).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// One or more proposal targets are not live nodes (404).
    #[error("target not found")]
    TargetNotFound(Vec<String>),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A fact batch failed validation (422); carries the offending record.
    #[error("invalid fact at index {index}: {reason}")]
    ValidationFailed {
        index: usize,
        reason: String,
        fact: serde_json::Value,
    },

    /// The repository is already ingesting (409); retry later.
    #[error("busy: {0}")]
    Busy(String),

    /// Proposal creation against a repository that is not Ingested (409).
    #[error("repository not ingested: {0}")]
    RepoNotIngested(String),

    /// Workflow state conflict (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ApiErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: msg,
                    details: None,
                },
            ),
            ApiError::TargetNotFound(missing) => (
                StatusCode::NOT_FOUND,
                ApiErrorDetail {
                    code: "TARGET_NOT_FOUND".to_string(),
                    message: format!("{} target node(s) not live in the graph", missing.len()),
                    details: serde_json::to_value(missing).ok(),
                },
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorDetail {
                    code: "BAD_REQUEST".to_string(),
                    message: msg,
                    details: None,
                },
            ),
            ApiError::ValidationFailed {
                index,
                reason,
                fact,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorDetail {
                    code: "VALIDATION_FAILED".to_string(),
                    message: format!("invalid fact at index {index}: {reason}"),
                    details: Some(serde_json::json!({ "index": index, "fact": fact })),
                },
            ),
            ApiError::Busy(msg) => (
                StatusCode::CONFLICT,
                ApiErrorDetail {
                    code: "BUSY".to_string(),
                    message: msg,
                    details: None,
                },
            ),
            ApiError::RepoNotIngested(msg) => (
                StatusCode::CONFLICT,
                ApiErrorDetail {
                    code: "REPO_NOT_INGESTED".to_string(),
                    message: msg,
                    details: None,
                },
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ApiErrorDetail {
                    code: "CONFLICT".to_string(),
                    message: msg,
                    details: None,
                },
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: msg,
                    details: None,
                },
            ),
        };

        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidFact {
                index,
                reason,
                fact,
            } => ApiError::ValidationFailed {
                index,
                reason,
                fact,
            },
            StorageError::RepoNotFound(_)
            | StorageError::NodeNotFound(_)
            | StorageError::ProposalNotFound(_) => ApiError::NotFound(err.to_string()),
            StorageError::RepoExists { .. } => ApiError::Conflict(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
