//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::logic::model::InferenceError;
use crate::logic::{DecodeError, PreprocessError};

pub type AppResult<T> = Result<T, AppError>;

/// Error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must fix the request
    ClientInput,
    /// Caller may retry later
    ServiceUnavailable,
    /// Opaque server-side failure
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    // Client input errors
    #[error("Missing 'image' field in request body.")]
    MissingField,

    #[error("Invalid base64 encoding: {0}")]
    InvalidEncoding(String),

    #[error("Image preprocessing failed: {0}")]
    Preprocessing(String),

    // Availability errors
    #[error("Model not loaded. Cannot perform classification.")]
    ModelUnavailable,

    // Generic errors
    #[error("An internal server error occurred: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::MissingField | AppError::InvalidEncoding(_) | AppError::Preprocessing(_) => {
                ErrorKind::ClientInput
            }
            AppError::ModelUnavailable => ErrorKind::ServiceUnavailable,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match self.kind() {
            ErrorKind::ClientInput => tracing::debug!("Rejected request: {}", message),
            ErrorKind::ServiceUnavailable => tracing::warn!("{}", message),
            ErrorKind::Internal => tracing::error!("Internal error: {}", message),
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::InvalidEncoding(err.to_string())
    }
}

impl From<PreprocessError> for AppError {
    fn from(err: PreprocessError) -> Self {
        AppError::Preprocessing(err.to_string())
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}
