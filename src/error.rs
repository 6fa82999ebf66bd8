use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::document::DocumentStage;
use crate::models::trip::TripStatus;
use crate::remote::RemoteError;

/// Local, synchronous failures of the trip lifecycle engine. The trip is
/// always left untouched when one of these is returned.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: TripStatus, to: TripStatus },

    #[error("inconsistent timeline: {0}")]
    InconsistentTimeline(String),

    #[error("{stage} documents cannot be uploaded while trip is {status}")]
    StageNotActive {
        stage: DocumentStage,
        status: TripStatus,
    },

    #[error("documents incomplete: {}", .0.join("; "))]
    DocumentsIncomplete(Vec<String>),

    #[error("{0} location unavailable for navigation")]
    LocationUnavailable(DocumentStage),

    #[error("invalid files: {}", .0.join("; "))]
    InvalidFiles(Vec<String>),

    #[error("{stage} remarks cannot be edited while trip is {status}")]
    RemarksLocked {
        stage: DocumentStage,
        status: TripStatus,
    },

    #[error("no active trip")]
    NoActiveTrip,
}

impl LifecycleError {
    pub fn details(&self) -> Vec<String> {
        match self {
            LifecycleError::DocumentsIncomplete(errors) | LifecycleError::InvalidFiles(errors) => {
                errors.clone()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("a request for this trip is already in flight")]
    RequestInFlight,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::RequestInFlight => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Lifecycle(err) => match err {
                LifecycleError::InvalidTransition { .. }
                | LifecycleError::StageNotActive { .. }
                | LifecycleError::RemarksLocked { .. } => StatusCode::CONFLICT,
                LifecycleError::NoActiveTrip => StatusCode::NOT_FOUND,
                LifecycleError::InconsistentTimeline(_)
                | LifecycleError::DocumentsIncomplete(_)
                | LifecycleError::LocationUnavailable(_)
                | LifecycleError::InvalidFiles(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
            AppError::Remote(RemoteError::Unauthorized) => StatusCode::UNAUTHORIZED,
            AppError::Remote(RemoteError::LocalFile(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &self {
            AppError::Lifecycle(err) => err.details(),
            _ => Vec::new(),
        };

        let body = if details.is_empty() {
            Json(json!({ "error": self.to_string() }))
        } else {
            Json(json!({ "error": self.to_string(), "details": details }))
        };

        (status, body).into_response()
    }
}
