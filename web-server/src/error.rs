// web-server/src/error.rs
use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use common::AuthError;
use serde_json::json;
use thiserror::Error;

/// Errors as they leave the HTTP boundary.
///
/// Every session failure maps to `Unauthenticated`, so responses never reveal
/// whether a cookie was missing, malformed, forged or expired.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("forbidden")]
    Forbidden,
    #[error("rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            err if err.is_credential_error() => ApiError::Unauthenticated,
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            _ => ApiError::Forbidden,
        }
    }
}

impl From<actix_web::error::HttpError> for ApiError {
    fn from(err: actix_web::error::HttpError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            ApiError::Unauthenticated => "Not authenticated",
            ApiError::InvalidCredentials => "Invalid credentials",
            ApiError::Forbidden => "Forbidden",
            ApiError::RateLimited { .. } => "Too many login attempts. Please try again later.",
            ApiError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                "Internal server error"
            }
        };

        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::RateLimited { retry_after } = self {
            response.insert_header((header::RETRY_AFTER, retry_after.to_string()));
        }
        response.json(json!({ "detail": detail }))
    }
}
