//! Error types for the Docshift server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::convert::{ConvertError, FailureClass};
use crate::transient::StoreError;
use crate::upload::UploadError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// How an error is reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; never retried
    ClientInput,
    /// External service, SDK or executable failed
    Upstream,
    /// Our own failure
    Internal,
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            // A zero-byte upload is the client's problem
            StoreError::EmptyFile(_) => AppError::Upload(UploadError::EmptyUpload),
            other => AppError::Store(other),
        }
    }
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Upload(_) => ErrorClass::ClientInput,
            AppError::Convert(e) => match e.class() {
                FailureClass::Upstream => ErrorClass::Upstream,
                FailureClass::Internal => ErrorClass::Internal,
            },
            AppError::Store(_) | AppError::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upload(e) => e.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Upload(e) => e.code(),
            AppError::Convert(e) => e.code(),
            AppError::Store(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self.class() {
            ErrorClass::ClientInput => {
                tracing::warn!(code = self.code(), "Rejected upload: {}", self);
                self.to_string()
            }
            ErrorClass::Upstream => {
                tracing::error!(code = self.code(), "Upstream failure: {}", self);
                self.to_string()
            }
            ErrorClass::Internal => {
                tracing::error!(code = self.code(), "Internal error: {}", self);
                "Internal server error".to_string()
            }
        };

        let details = if self.class() == ErrorClass::Internal && cfg!(debug_assertions) {
            Some(self.to_string())
        } else {
            None
        };

        let body = Json(ErrorResponse {
            error: message,
            code: self.code(),
            details,
        });

        (self.status_code(), body).into_response()
    }
}
