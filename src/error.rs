use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::auth::repo::RepoError;

/// Failures of the account workflow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User not found!")]
    NotFound,

    #[error("Account is not verified. Please check your email!")]
    AccountDisabled,

    #[error("Invalid username or password!")]
    InvalidCredentials,

    /// A valid token whose subject has since disappeared.
    #[error("Authenticated user no longer exists")]
    UnknownSubject,

    #[error("Account is already verified!")]
    AlreadyVerified,

    #[error("Verification code is null! You might have already verified your account!")]
    CodeMissing,

    #[error("Verification code has expired!")]
    Expired,

    #[error("Incorrect verification code!")]
    IncorrectCode,

    #[error("{0} is already taken")]
    UniquenessViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthError::InvalidCredentials | AuthError::UnknownSubject => StatusCode::UNAUTHORIZED,
            AuthError::UniquenessViolation(_) => StatusCode::CONFLICT,
            AuthError::AlreadyVerified
            | AuthError::CodeMissing
            | AuthError::Expired
            | AuthError::IncorrectCode
            | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Internal(_))
    }
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(field) => AuthError::UniquenessViolation(field),
            RepoError::Database(e) => AuthError::Internal(anyhow::Error::new(e).context("user store")),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
