//! Error types for the cache machine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine and its front ends.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Blank key or value, or a value too large to ever fit the cache
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Snapshot could not be written, read or decoded
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl CacheError {
    /// Builds a persistence error from any displayable cause.
    pub fn persistence(context: &str, cause: impl std::fmt::Display) -> Self {
        CacheError::Persistence(format!("{}: {}", context, cause))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CacheError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache machine.
pub type Result<T> = std::result::Result<T, CacheError>;
