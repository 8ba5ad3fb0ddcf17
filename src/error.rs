use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Account blocked")]
    Blocked,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Content too large")]
    ContentTooLarge,

    #[error("Unsupported media type")]
    UnsupportedMediaType,
}

impl AppError {
    /// Status and the message safe to show to the client. Internal causes
    /// are logged here and never leave the process.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        let (status, error_message) = match self {
            AppError::Backend(e) => match e {
                BackendError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid email or password. Please try again.",
                ),
                BackendError::EmailExists => (
                    StatusCode::CONFLICT,
                    "This email is already registered. Please use another one.",
                ),
                BackendError::UserNotFound => (
                    StatusCode::NOT_FOUND,
                    "No account found for this email.",
                ),
                BackendError::TooManyAttempts => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many failed attempts. Try again later.",
                ),
                BackendError::WeakPassword => (
                    StatusCode::BAD_REQUEST,
                    "Password must be at least 6 characters long.",
                ),
                _ => {
                    tracing::error!("Backend error: {:?}", e);
                    (StatusCode::BAD_GATEWAY, "External service error")
                }
            },
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message.as_str()),
            AppError::Authentication(message) => (StatusCode::UNAUTHORIZED, message.as_str()),
            AppError::Authorization(message) => (StatusCode::FORBIDDEN, message.as_str()),
            AppError::Blocked => (
                StatusCode::FORBIDDEN,
                "Your account has been blocked by an administrator",
            ),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message.as_str()),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message.as_str()),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.as_str()),
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {:?}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token")
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::RateLimit => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
            AppError::ContentTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Content too large"),
            AppError::UnsupportedMediaType => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported media type")
            }
        };

        (status, error_message.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Validation helper
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut error_messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error.message.as_ref().unwrap_or(&"Invalid value".into())
                    )
                })
            })
            .collect();
        error_messages.sort();

        AppError::Validation(error_messages.join(", "))
    }
}
