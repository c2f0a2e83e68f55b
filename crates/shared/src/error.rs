use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes the auth provider can report, named after the `auth/*` codes
/// the Firebase client SDKs surface to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthErrorCode {
    EmailAlreadyInUse,
    InvalidEmail,
    MissingEmail,
    MissingPassword,
    WeakPassword,
    InvalidCredential,
    UserNotFound,
    WrongPassword,
    UserDisabled,
    TooManyRequests,
    UserTokenExpired,
    OperationNotAllowed,
    NetworkRequestFailed,
    InternalError,
}

impl AuthErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::InvalidEmail => "auth/invalid-email",
            Self::MissingEmail => "auth/missing-email",
            Self::MissingPassword => "auth/missing-password",
            Self::WeakPassword => "auth/weak-password",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::UserDisabled => "auth/user-disabled",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::UserTokenExpired => "auth/user-token-expired",
            Self::OperationNotAllowed => "auth/operation-not-allowed",
            Self::NetworkRequestFailed => "auth/network-request-failed",
            Self::InternalError => "auth/internal-error",
        }
    }

    /// Maps the server-side reason (`EMAIL_EXISTS`, `WEAK_PASSWORD : ...`) of an
    /// Identity Toolkit or Secure Token error to a client code.
    pub fn from_server_reason(reason: &str) -> Self {
        let head = reason.split(':').next().unwrap_or_default().trim();
        match head {
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "MISSING_EMAIL" => Self::MissingEmail,
            "MISSING_PASSWORD" => Self::MissingPassword,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" => Self::InvalidCredential,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" => Self::WrongPassword,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" => {
                Self::UserTokenExpired
            }
            "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => Self::OperationNotAllowed,
            _ => Self::InternalError,
        }
    }

    /// Whether this code means the stored session can no longer be used.
    pub fn ends_session(self) -> bool {
        matches!(
            self,
            Self::UserTokenExpired | Self::UserDisabled | Self::UserNotFound
        )
    }
}

/// Formats the message shown to a user, in the shape the Firebase web SDK uses:
/// `Firebase: Error (auth/email-already-in-use).`, or with the server's detail
/// when one is attached (`Firebase: Password should be at least 6 characters (auth/weak-password).`).
pub fn auth_error_message(code: AuthErrorCode, server_reason: Option<&str>) -> String {
    let detail = server_reason
        .and_then(|reason| reason.split_once(':'))
        .map(|(_, detail)| detail.trim())
        .filter(|detail| !detail.is_empty());
    match detail {
        Some(detail) => format!("Firebase: {detail} ({}).", code.as_str()),
        None => format!("Firebase: Error ({}).", code.as_str()),
    }
}

/// Error envelope returned by Google REST APIs:
/// `{"error": {"code": 400, "message": "EMAIL_EXISTS", "status": "INVALID_ARGUMENT"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderErrorEnvelope {
    pub error: ProviderError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code} {message}")]
pub struct ProviderError {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ProviderError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    /// Decodes an error body, falling back to the raw text when the body is not
    /// the standard envelope (proxies, HTML error pages).
    pub fn from_body(http_status: u16, body: &str) -> Self {
        match serde_json::from_str::<ProviderErrorEnvelope>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => Self::new(http_status, body.trim()),
        }
    }
}
