//! Seam between the controller and whatever front-end talks to the user.

use async_trait::async_trait;
use shared::error::AuthErrorCode;

use crate::error::{AuthError, DataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeContext {
    SignOut,
    Refresh,
    AddCustomer,
    DeleteCustomer,
}

impl NoticeContext {
    pub fn label(self) -> &'static str {
        match self {
            Self::SignOut => "sign out",
            Self::Refresh => "refresh",
            Self::AddCustomer => "add customer",
            Self::DeleteCustomer => "delete customer",
        }
    }
}

/// How the external service failed, taken from the typed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Unreachable,
    /// Credentials or the store's security rules refused the request.
    Denied,
    Rejected,
    Malformed,
}

impl From<&DataError> for NoticeKind {
    fn from(err: &DataError) -> Self {
        match err {
            DataError::Transport(_) => Self::Unreachable,
            DataError::PermissionDenied(_) => Self::Denied,
            DataError::Rejected { .. } | DataError::NotFound(_) => Self::Rejected,
            DataError::Malformed(_) => Self::Malformed,
        }
    }
}

impl From<&AuthError> for NoticeKind {
    fn from(err: &AuthError) -> Self {
        match err.code {
            AuthErrorCode::NetworkRequestFailed => Self::Unreachable,
            AuthErrorCode::InternalError => Self::Malformed,
            AuthErrorCode::TooManyRequests => Self::Rejected,
            _ => Self::Denied,
        }
    }
}

/// Non-blocking, user-visible report of a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub context: NoticeContext,
    pub kind: NoticeKind,
    pub message: String,
}

#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Shows `message` and resolves once the user has acknowledged it.
    async fn alert(&self, message: &str);
    /// Asks a yes/no question and resolves with the answer.
    async fn confirm(&self, question: &str) -> bool;
    fn notify(&self, notice: Notice);
}
