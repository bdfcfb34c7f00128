use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use thiserror::Error;
use tracing::{error, warn};

use crate::envelope::Failure;

/// Everything a handler can fail with, rendered as the `{ "error": ... }` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Multipart(#[from] MultipartError),

    #[error("{0}")]
    Json(#[from] JsonRejection),

    #[error("{0}")]
    Query(#[from] QueryRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(err) => domain_status(err),
            Self::Multipart(err) => err.status(),
            Self::Json(_) | Self::Query(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Multipart(err) => err.body_text(),
            Self::Json(err) => err.body_text(),
            Self::Query(err) => err.body_text(),
            Self::Domain(err) => err.to_string(),
        }
    }
}

/// Client mistakes are 400, missing resources 404, store trouble 5xx.
pub fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::Unauthorized(_)
        | DomainError::Forbidden(_)
        | DomainError::Conflict(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(..) => StatusCode::NOT_FOUND,
        DomainError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        // Internal details stay in the log.
        let message = match &self {
            Self::Domain(DomainError::Internal(_)) => "An error occurred".to_string(),
            _ => self.message(),
        };
        (status, Json(Failure::new(message))).into_response()
    }
}
