//! ID token verification error types.

use jsonwebtoken::Algorithm;
use std::time::Duration;
use thiserror::Error;

pub type IdTokenResult<T> = Result<T, IdTokenError>;

#[derive(Debug, Error)]
pub enum IdTokenError {
    #[error("Malformed ID token: {0}")]
    InvalidToken(String),

    #[error("Unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token was not issued for audience {0}")]
    InvalidAudience(String),

    #[error("Token issuer is not trusted")]
    InvalidIssuer,

    #[error("Signing key not found: {0}")]
    KeyNotFound(String),

    #[error("Failed to fetch provider certificates: {0}")]
    CertificateFetch(String),

    #[error("Verified token carried no usable claims")]
    MissingClaims,

    #[error("Token verification timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<config::ConfigError> for IdTokenError {
    fn from(error: config::ConfigError) -> Self {
        IdTokenError::Config(error.to_string())
    }
}
