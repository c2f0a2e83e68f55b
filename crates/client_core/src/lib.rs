//! Client side of the CRM: the session & data controller and the services it
//! talks to.

pub mod auth;
pub mod backends;
pub mod config;
pub mod controller;
pub mod error;
pub mod firestore;
pub mod identity_toolkit;
pub mod memory;
pub mod prompt;
pub mod records;
pub mod session;

pub use auth::{AnonymousTokens, AuthProvider, IdTokenSource};
pub use backends::{
    hosted_backends, memory_backends, open_backends, BackendKind, Backends, LaunchOptions,
};
pub use config::{load_settings, BackendSettings, SettingsError};
pub use controller::{ActionOutcome, ControllerSnapshot, CrmController, SessionView};
pub use error::{AuthError, ControllerError, DataError};
pub use firestore::FirestoreRecordStore;
pub use identity_toolkit::{IdentityToolkitAuth, IdentityToolkitEndpoints};
pub use memory::{InMemoryAuthProvider, InMemoryRecordStore};
pub use prompt::{Notice, NoticeContext, NoticeKind, UserPrompt};
pub use records::RecordStore;
pub use session::{SessionHub, SessionSubscription};

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod controller_tests;

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod session_tests;
