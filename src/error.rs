/// Unified error types for Wolbridge
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for both services
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Malformed user input (identity, credential payload, address)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No session, expired session, missing or expired challenge,
    /// credential mismatch
    #[error("Authentication required: {0}")]
    Auth(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Relay unreachable, timed out, or returned non-success
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal errors (store I/O and the like)
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response body
///
/// Auth denials carry a redirect hint so the front end can send the
/// operator back to the credential prompt.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Convert BridgeError to HTTP response
impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, redirect, message) = match &self {
            BridgeError::Validation(_) => (StatusCode::BAD_REQUEST, None, self.to_string()),
            BridgeError::Auth(_) => (
                StatusCode::UNAUTHORIZED,
                Some("/".to_string()),
                self.to_string(),
            ),
            BridgeError::NotFound(_) => (StatusCode::NOT_FOUND, None, self.to_string()),
            BridgeError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, None, self.to_string()),
            BridgeError::Internal(_) | BridgeError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                // Don't leak filesystem or other internal detail
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            redirect,
        });

        (status, body).into_response()
    }
}

/// Result type alias for Wolbridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
