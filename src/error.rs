use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{auth::AuthError, repository::RepoError};

/// ApiError
///
/// The single error type returned by handlers. Gate failures keep their own
/// response mapping; repository failures are logged and surface as a bare 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::Auth(err) => return err.into_response(),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, "bad_request"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string(), "not_found"),
            ApiError::Repo(err) => {
                tracing::error!(error = %err, "repository failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string(), "internal_error")
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string(), "internal_error")
            }
        };
        (status, Json(json!({ "message": message, "error_code": code }))).into_response()
    }
}
