// src/error.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Lower-layer fault; never retried here.
    #[error("Storage failure: {0}")]
    StorageFailure(#[source] BoxError),

    /// Server misconfiguration, such as missing app data.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WatchError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<sqlx::Error> for WatchError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageFailure(Box::new(err))
    }
}

impl ResponseError for WatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            WatchError::NotFound(_) => StatusCode::NOT_FOUND,
            WatchError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            WatchError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WatchError::StorageFailure(_) | WatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            WatchError::StorageFailure(e) => {
                tracing::error!("Storage failure: {}", e);
                HttpResponse::InternalServerError().json(json!({"error": "Internal server error"}))
            }
            WatchError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                HttpResponse::InternalServerError().json(json!({"error": "Internal server error"}))
            }
            other => HttpResponse::build(other.status_code()).json(json!({"error": other.to_string()})),
        }
    }
}
