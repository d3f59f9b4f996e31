//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Transport, timeout and decode failures are recovered inside the cache and
//! only surface in logs. Configuration errors are raised when a memoized
//! operation is built against an unknown policy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The distributed tier could not be reached or rejected a command
    #[error("L2 unavailable: {0}")]
    Transport(String),

    /// An L2 operation did not finish within its deadline
    #[error("L2 operation timed out after {0}ms")]
    Timeout(u64),

    /// Stored bytes could not be turned back into a value
    #[error("Decode failed: {0}")]
    Decode(String),

    /// A value could not be serialized
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Unknown policy name or invalid policy definition
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Transport(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        CacheError::Transport(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Configuration(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Transport(_) | CacheError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Decode(_) | CacheError::Encode(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
