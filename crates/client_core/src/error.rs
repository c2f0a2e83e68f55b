//! Error taxonomy of the controller and its two external services.

use shared::error::{auth_error_message, AuthErrorCode};
use thiserror::Error;

/// Failure reported by the auth provider. `message` is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: AuthErrorCode) -> Self {
        Self::new(code, auth_error_message(code, None))
    }

    /// Builds the error for a server reason such as `EMAIL_EXISTS` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    pub fn from_server_reason(reason: &str) -> Self {
        let code = AuthErrorCode::from_server_reason(reason);
        Self::new(code, auth_error_message(code, Some(reason)))
    }

    pub fn network(detail: impl std::fmt::Display) -> Self {
        tracing::debug!(%detail, "auth transport failure");
        Self::from_code(AuthErrorCode::NetworkRequestFailed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("record store unreachable: {0}")]
    Transport(String),
    #[error("record store denied access: {0}")]
    PermissionDenied(String),
    #[error("record store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("malformed record store response: {0}")]
    Malformed(String),
}

/// Failure to obtain a bearer token for a record store request.
impl From<AuthError> for DataError {
    fn from(err: AuthError) -> Self {
        match err.code {
            AuthErrorCode::NetworkRequestFailed => Self::Transport(err.message),
            AuthErrorCode::InternalError => Self::Malformed(err.message),
            AuthErrorCode::TooManyRequests => Self::Rejected {
                status: 429,
                message: err.message,
            },
            _ => Self::PermissionDenied(err.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Data(#[from] DataError),
}

impl ControllerError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
