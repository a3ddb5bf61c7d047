//! HTTP error types and implementations

#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced by the gateway's HTTP endpoints
///
/// Bodies are plain text so that clients can branch on the exact content,
/// in particular on the TFA sentinels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Missing or invalid credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid credentials with an unfinished TFA step
    #[error("{0}")]
    TfaPending(&'static str),

    /// The security provider refused the operation
    #[error("{0}")]
    Rejected(String),

    /// Unreadable or undecodable request, or an overlay application error
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[cfg(feature = "server")]
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            HttpError::TfaPending(sentinel) => (StatusCode::UNAUTHORIZED, sentinel).into_response(),
            HttpError::Rejected(message) => (StatusCode::UNAUTHORIZED, message).into_response(),
            HttpError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            HttpError::Internal(message) => {
                error!("internal error: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

/// Result type alias using HttpError
pub type Result<T> = std::result::Result<T, HttpError>;
