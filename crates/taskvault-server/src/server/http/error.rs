//! Error responses for the HTTP API.
//!
//! Every failure a handler or middleware can produce is an [`ApiError`]. Its
//! [`IntoResponse`] impl picks the status code and renders the
//! `{ "message": ..., "error": ... }` envelope.

use super::auth::AuthError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: &'static str,
    pub error: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The body was not valid JSON or did not match the expected shape.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The body parsed but failed field validation. Keyed by field name.
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),

    /// The `{id}` path segment is not a `u64`.
    #[error("Invalid task ID: {0}")]
    InvalidTaskId(#[from] core::num::ParseIntError),

    #[error("Task not found")]
    NotFound(#[from] taskvault::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A handler ran without the auth middleware having attached an owner.
    #[error("Failed to retrieve user ID")]
    MissingIdentity,

    #[error("Limit exceeded")]
    RateLimited,

    #[error("Route not found")]
    RouteNotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) | Self::Validation(_) | Self::InvalidTaskId(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::Issue(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::MissingIdentity => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn envelope(self) -> ErrorResponse {
        let (message, error) = match self {
            Self::InvalidBody(detail) => ("Invalid request body", Value::String(detail)),
            Self::Validation(fields) => (
                "Validation failed",
                Value::Object(
                    fields
                        .into_iter()
                        .map(|(field, msg)| (field, Value::String(msg)))
                        .collect(),
                ),
            ),
            Self::InvalidTaskId(err) => ("Invalid task ID", Value::String(err.to_string())),
            Self::NotFound(_) => ("Task not found", "invalid id".into()),
            Self::Auth(AuthError::MissingUserId) => (
                "Invalid token claims",
                "user_id claim missing or invalid".into(),
            ),
            Self::Auth(err @ AuthError::Issue(_)) => {
                ("Failed to generate token", Value::String(err.to_string()))
            }
            Self::Auth(err) => ("Unauthorized", Value::String(err.to_string())),
            Self::MissingIdentity => ("Failed to retrieve user ID", "invalid id".into()),
            Self::RateLimited => ("Limit exceeded", "too many requests".into()),
            Self::RouteNotFound => ("Route not found", "invalid route".into()),
        };
        ErrorResponse { message, error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(self.envelope())).into_response()
    }
}
