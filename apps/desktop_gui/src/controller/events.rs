//! UI/backend events and error modeling for desktop GUI controller.

use client_core::{ControllerSnapshot, Notice, NoticeContext, NoticeKind};
use tokio::sync::oneshot;

pub enum UiEvent {
    /// Backends are open and the session observer is registered.
    Ready,
    Info(String),
    StateChanged {
        snapshot: ControllerSnapshot,
        /// True when produced by a finished command rather than a session
        /// notification; only then are the form buffers synced back.
        after_command: bool,
    },
    /// Blocking alert; the worker waits until `ack` fires or is dropped.
    Alert {
        message: String,
        ack: oneshot::Sender<()>,
    },
    ConfirmRequested {
        question: String,
        reply: oneshot::Sender<bool>,
    },
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    SignOut,
    Refresh,
    AddCustomer,
    DeleteCustomer,
    General,
}

impl From<NoticeContext> for UiErrorContext {
    fn from(context: NoticeContext) -> Self {
        match context {
            NoticeContext::SignOut => Self::SignOut,
            NoticeContext::Refresh => Self::Refresh,
            NoticeContext::AddCustomer => Self::AddCustomer,
            NoticeContext::DeleteCustomer => Self::DeleteCustomer,
        }
    }
}

impl From<NoticeKind> for UiErrorCategory {
    fn from(kind: NoticeKind) -> Self {
        match kind {
            NoticeKind::Unreachable => Self::Transport,
            NoticeKind::Denied => Self::Auth,
            NoticeKind::Malformed => Self::Validation,
            NoticeKind::Rejected => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    /// Classifies free-form messages that carry no typed failure, such as
    /// worker startup and queue errors.
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("auth/")
            || message_lower.contains("401")
            || message_lower.contains("403")
            || message_lower.contains("denied access")
            || message_lower.contains("permission")
            || message_lower.contains("unauthenticated")
        {
            UiErrorCategory::Auth
        } else if message_lower.contains("unreachable")
            || message_lower.contains("offline")
            || message_lower.contains("timed out")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("unavailable")
            || message_lower.contains("disconnected")
        {
            UiErrorCategory::Transport
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn from_notice(notice: &Notice) -> Self {
        Self {
            category: notice.kind.into(),
            context: notice.context.into(),
            message: format!("{} failed: {}", notice.context.label(), notice.message),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Auth => "Access",
        UiErrorCategory::Transport => "Connection",
        UiErrorCategory::Validation => "Data",
        UiErrorCategory::Unknown => "Unexpected",
    }
}
