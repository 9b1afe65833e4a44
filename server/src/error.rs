// /server/src/error.rs
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Name of the unique constraint guarding one review per (loo, reviewer).
pub const REVIEW_UNIQUE_CONSTRAINT: &str = "loo_reviews_loo_reviewer_key";

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("Invalid token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("You do not have permission to modify this resource")]
    Authorization,
    #[error("{0}")]
    NotFound(String),
    #[error("You have already reviewed this loo")]
    DuplicateReview,
    #[error("Image size must be less than 5MB")]
    PayloadTooLarge,
    #[error("Only JPEG and PNG images are allowed")]
    UnsupportedMediaType,
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::DuplicateReview
            | AppError::PayloadTooLarge
            | AppError::UnsupportedMediaType => StatusCode::BAD_REQUEST,
            AppError::AuthenticationRequired | AppError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Authorization => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Migration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Database(e) => tracing::error!("SQLx error: {:?}", e),
            AppError::Migration(e) => tracing::error!("Migration error: {:?}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::InvalidToken(e) => tracing::debug!("JWT error: {:?}", e),
            _ => {}
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::not_found("Resource not found"),
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some(REVIEW_UNIQUE_CONSTRAINT) =>
            {
                AppError::DuplicateReview
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::not_found("Loo not found")
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::invalid(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::invalid(rejection.body_text())
    }
}

/// A stream cut off by the request body limit is still an oversized image.
impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::invalid(format!("Malformed multipart body: {}", err.body_text()))
    }
}
