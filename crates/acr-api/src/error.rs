//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps the domain errors of `acr-state` and `acr-governance` to HTTP
//! status codes and a JSON body of the form
//! `{"error": {"code", "message", "details"}}`.
//! Internal error details are never exposed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use acr_governance::TaskError;
use acr_state::{AssessmentError, DocumentationError, PolicyError, SystemError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "PROHIBITED_SYSTEM").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional structured context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller's role or identity may not perform the operation (403).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation is refused for a domain reason (403). The reason code
    /// becomes the response `code`.
    #[error("forbidden ({code}): {message}")]
    Forbidden {
        code: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The state machine has no such transition from the current state (409).
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The operation is not permitted in the record's current state (409).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Optimistic concurrency check failed; the caller may re-read and retry (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            Self::Forbidden { code, .. } => (StatusCode::FORBIDDEN, *code),
            Self::InvalidTransition(_) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            Self::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::NotFound(m)
            | Self::Validation(m)
            | Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::PermissionDenied(m)
            | Self::InvalidTransition(m)
            | Self::InvalidState(m)
            | Self::Conflict(m) => m.clone(),
            Self::Forbidden { message, .. } => message.clone(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Conflict(_) => Some(serde_json::json!({ "retryable": true })),
            Self::Forbidden { details, .. } => details.clone(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<acr_core::ValidationError> for AppError {
    fn from(err: acr_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<SystemError> for AppError {
    fn from(err: SystemError) -> Self {
        match &err {
            SystemError::Validation(_) => Self::Validation(err.to_string()),
            SystemError::VersionConflict { .. } => Self::Conflict(err.to_string()),
            SystemError::GuardedWrite { .. } | SystemError::InvalidStatusChange { .. } => {
                Self::InvalidState(err.to_string())
            }
        }
    }
}

impl From<AssessmentError> for AppError {
    fn from(err: AssessmentError) -> Self {
        match &err {
            AssessmentError::Validation(_) => Self::Validation(err.to_string()),
            AssessmentError::InvalidTransition { .. } => Self::InvalidTransition(err.to_string()),
            AssessmentError::PermissionDenied { .. } => Self::PermissionDenied(err.to_string()),
            // The gate's reason is surfaced verbatim.
            AssessmentError::InvalidState { .. } | AssessmentError::GateVeto { .. } => {
                Self::InvalidState(err.to_string())
            }
            AssessmentError::RevisionConflict { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<DocumentationError> for AppError {
    fn from(err: DocumentationError) -> Self {
        match &err {
            DocumentationError::Forbidden { reason, system_id } => Self::Forbidden {
                code: reason.code(),
                message: err.to_string(),
                details: Some(serde_json::json!({ "system_id": system_id })),
            },
            DocumentationError::Canonicalization(_) | DocumentationError::Render(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        match &err {
            PolicyError::Validation(_) => Self::Validation(err.to_string()),
            PolicyError::RevisionConflict { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match &err {
            TaskError::NotFound { .. } => Self::NotFound(err.to_string()),
            TaskError::InvalidState { .. } => Self::InvalidState(err.to_string()),
            TaskError::Validation(_) => Self::Validation(err.to_string()),
            TaskError::Canonicalization(_) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acr_core::{ActorId, AssessmentId, SystemId};
    use acr_state::{AssessmentStatus, ForbiddenReason, GateAction};
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_codes_follow_the_taxonomy() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::PermissionDenied("x".into()), StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            (AppError::InvalidTransition("x".into()), StatusCode::CONFLICT, "INVALID_TRANSITION"),
            (AppError::InvalidState("x".into()), StatusCode::CONFLICT, "INVALID_STATE"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_their_message() {
        let (status, body) = body_json(AppError::Internal("db password=hunter2".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn conflicts_are_marked_retryable() {
        let (status, body) = body_json(AppError::Conflict("stale revision".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["details"]["retryable"], true);
    }

    #[tokio::test]
    async fn prohibited_generation_uses_reason_code() {
        let err: AppError = DocumentationError::Forbidden {
            reason: ForbiddenReason::ProhibitedSystem,
            system_id: SystemId::new(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "PROHIBITED_SYSTEM");
        assert!(body["error"]["details"]["system_id"].is_string());
    }

    #[tokio::test]
    async fn gate_veto_reason_is_verbatim() {
        let err: AppError = AssessmentError::GateVeto {
            action: GateAction::SubmitAssessment,
            reason: "system is retired".to_string(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATE");
        assert_eq!(body["error"]["message"], "system is retired");
    }

    #[test]
    fn assessment_errors_map_to_distinct_variants() {
        let id = AssessmentId::new();
        let denied: AppError = AssessmentError::PermissionDenied {
            id,
            actor: ActorId::new("alice").unwrap(),
            action: GateAction::ApproveAssessment,
            reason: "author".to_string(),
        }
        .into();
        assert!(matches!(denied, AppError::PermissionDenied(_)));

        let transition: AppError = AssessmentError::InvalidTransition {
            id,
            from: AssessmentStatus::Approved,
            action: GateAction::SubmitAssessment,
        }
        .into();
        assert!(matches!(transition, AppError::InvalidTransition(_)));

        let conflict: AppError = AssessmentError::RevisionConflict {
            id,
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(conflict, AppError::Conflict(_)));
    }

    #[test]
    fn guarded_write_is_invalid_state() {
        let err: AppError = SystemError::GuardedWrite {
            system_id: SystemId::new(),
            reason: "remediation note required".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::InvalidState(_)));
    }
}
