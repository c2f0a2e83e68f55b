//! UI layer for desktop GUI: sign-in screen, customer list and dialogs.

pub mod app;

pub use app::CrmApp;
