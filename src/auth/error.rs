//! Authentication and authorization errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failures of the credential codec.
///
/// The verification variants stay internal: every one of them reaches the client
/// as the same unauthorized response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Outcome of a rejected request at either gate.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session cookie on the request.
    #[error("no session credential presented")]
    NoCredential,
    /// A cookie was present but did not verify.
    #[error("invalid session credential: {0}")]
    InvalidCredential(#[source] TokenError),
    /// Authenticated, but the directory does not grant the admin role.
    #[error("insufficient privilege")]
    InsufficientPrivilege,
    /// The user directory could not be consulted.
    #[error("user directory lookup failed: {0}")]
    DirectoryLookupFailure(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    message: &'static str,
    error_code: &'static str,
}

impl AuthError {
    /// Stable machine-readable reason sent to the client.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NoCredential | AuthError::InvalidCredential(_) => "unauthorized",
            AuthError::InsufficientPrivilege => "insufficient_privilege",
            AuthError::DirectoryLookupFailure(_) => "directory_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NoCredential
            | AuthError::InvalidCredential(_)
            | AuthError::InsufficientPrivilege => StatusCode::UNAUTHORIZED,
            AuthError::DirectoryLookupFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            AuthError::DirectoryLookupFailure(_) => "internal server error",
            _ => "unauthorized access",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::InvalidCredential(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(AuthErrorBody {
            message: self.client_message(),
            error_code: self.error_code(),
        });
        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AuthError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn authentication_failures_are_indistinguishable() {
        let missing = body_of(AuthError::NoCredential).await;
        let bad_sig = body_of(TokenError::SignatureInvalid.into()).await;
        let expired = body_of(TokenError::Expired.into()).await;
        let malformed = body_of(TokenError::Malformed.into()).await;

        assert_eq!(missing.0, StatusCode::UNAUTHORIZED);
        assert_eq!(missing, bad_sig);
        assert_eq!(missing, expired);
        assert_eq!(missing, malformed);
        assert_eq!(missing.1["error_code"], "unauthorized");
    }

    #[tokio::test]
    async fn insufficient_privilege_is_unauthorized_with_own_code() {
        let (status, body) = body_of(AuthError::InsufficientPrivilege).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "insufficient_privilege");
    }

    #[tokio::test]
    async fn directory_failure_is_a_server_error() {
        let (status, body) = body_of(AuthError::DirectoryLookupFailure("connection refused".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_code"], "directory_unavailable");
        assert!(!body.to_string().contains("connection refused"));
    }
}
