//! Request-level error taxonomy shared by all REST handlers.
//!
//! Every failure surfaced to a caller is one of these variants; store-level
//! failures collapse into `Internal` after being logged. A failed request has
//! no partial effect — handlers return before any write when they reject.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Referenced entity (user, chat, message) does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Caller is authenticated but is not a participant of the resource.
    #[error("access denied")]
    AccessDenied,

    /// The request is well-formed but the operation is not allowed
    /// (self-chat, empty interest selection, duplicate registration).
    #[error("{0}")]
    InvalidOperation(&'static str),

    /// Store or runtime failure. Details are logged, never sent to clients.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        tracing::error!(error = %err, "database error");
        Self::Internal
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        Self::Internal
    }
}
