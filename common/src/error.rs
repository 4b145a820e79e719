// common/src/error.rs
use thiserror::Error;

/// Failures of the session authentication subsystem.
///
/// The distinction between the credential variants exists for logging only;
/// at the HTTP boundary they all collapse to the same 401 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Cookie bytes could not be parsed into a credential
    #[error("malformed credential")]
    Malformed,
    /// Signature mismatch: tampered claims, wrong secret or wrong algorithm
    #[error("invalid credential signature")]
    InvalidSignature,
    /// Signature is valid but the credential is past its lifetime
    #[error("credential expired")]
    Expired,
    /// Login rejected by the user store
    #[error("invalid username or password")]
    InvalidCredentials,
    /// Request origin is not on the allow-list
    #[error("origin not allowed")]
    OriginNotAllowed,
}

impl AuthError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Malformed => "malformed",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::OriginNotAllowed => "origin_not_allowed",
        }
    }

    /// True for the failures that reject a session cookie.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            AuthError::Malformed | AuthError::InvalidSignature | AuthError::Expired
        )
    }
}

/// Startup configuration failures. Any of these aborts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("SECRET_KEY must be set")]
    MissingSecret,
    #[error("SECRET_KEY is a placeholder value and cannot be used in {0} mode")]
    DefaultSecret(String),
    #[error("unsupported JWT_ALGORITHM '{0}': expected HS256, HS384 or HS512")]
    UnsupportedAlgorithm(String),
    #[error("ACCESS_TOKEN_EXPIRE_HOURS must be between 1 and 87600")]
    InvalidLifetime,
    #[error("unsupported COOKIE_SAMESITE '{0}': expected strict, lax or none")]
    InvalidSameSite(String),
    #[error("COOKIE_SAMESITE=none requires COOKIE_SECURE=true")]
    InsecureCrossSiteCookie,
}
