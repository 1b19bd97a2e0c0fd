use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::routes::ApiResponse;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid key")]
    SecretInvalid,

    #[error("Key expired")]
    SecretExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl AppError {
    /// Envelope code. Credential failures get distinct codes so clients can
    /// tell an expired token from a bad one.
    pub fn code(&self) -> i32 {
        match self {
            AppError::InvalidCredential => 40100,
            AppError::SecretInvalid => 40101,
            AppError::SecretExpired => 40102,
            AppError::TokenInvalid => 40103,
            AppError::TokenExpired => 40104,
            _ => self.status().as_u16() as i32,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredential
            | AppError::SecretInvalid
            | AppError::SecretExpired
            | AppError::TokenInvalid
            | AppError::TokenExpired
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidParam(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Crypto(_)
            | AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Crypto(msg) => {
                tracing::error!("Crypto error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                "Database Error".to_string()
            }
            AppError::Config(msg) => {
                tracing::error!("Config error: {}", msg);
                "Configuration Error".to_string()
            }
            AppError::Remote(msg) => {
                tracing::warn!("Remote service error: {}", msg);
                "Remote Service Error".to_string()
            }
            other => other.to_string(),
        };

        let body = ApiResponse::<()>::error(self.code(), message);
        (status, Json(body)).into_response()
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}

/// Helper to convert anyhow errors to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = AppError::NotFound("User not found".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_credential_errors_are_unauthorized() {
        for err in [
            AppError::InvalidCredential,
            AppError::SecretInvalid,
            AppError::TokenExpired,
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(AppError::InvalidCredential.code(), 40100);
        assert_eq!(AppError::TokenExpired.code(), 40104);
        assert_eq!(AppError::Forbidden.code(), 403);
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_not_found("Item not found");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
