//! Error taxonomy shared by the account directory, token service and task store.
//!
//! Absent results are `Option::None`, never an error. `Internal` carries a
//! description for the logs only; the HTTP layer replaces it with an opaque body.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{auth::token::TokenError, store::StoreError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),
    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    /// Bad credentials or an unusable token. The message is deliberately generic.
    #[error("{0}")]
    Auth(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

pub const INVALID_CREDENTIALS: &str = "invalid credentials";
pub const INVALID_TOKEN: &str = "invalid token";

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Body of every non-2xx response.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => Self::Conflict(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        if err.is_internal() {
            Self::Internal(err.to_string())
        } else {
            Self::Auth(INVALID_TOKEN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_maps_to_conflict() {
        let err = Error::from(StoreError::Conflict("username already exists".to_string()));
        assert!(matches!(err, Error::Conflict(ref m) if m == "username already exists"));
    }

    #[test]
    fn store_timeout_maps_to_internal() {
        let err = Error::from(StoreError::Timeout);
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn token_failures_are_uniform() {
        let expired = Error::from(TokenError::Expired);
        let forged = Error::from(TokenError::InvalidSignature);
        assert_eq!(expired.to_string(), forged.to_string());
        assert_eq!(expired.to_string(), INVALID_TOKEN);
    }

    #[test]
    fn error_body_is_a_single_error_field() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(ErrorBody::new("admin access required"))?;
        assert_eq!(value, serde_json::json!({ "error": "admin access required" }));
        Ok(())
    }

    #[test]
    fn missing_secret_is_internal() {
        let err = Error::from(TokenError::MissingSecret);
        assert!(matches!(err, Error::Internal(_)));
    }
}
