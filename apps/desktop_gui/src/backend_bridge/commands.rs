//! Backend commands queued from UI to backend worker.

use std::fmt;

use shared::domain::CustomerId;

/// One controller operation, carrying the form contents it reads.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendCommand {
    SignUp { email: String, password: String },
    SignIn { email: String, password: String },
    SignOut,
    AddCustomer { name: String },
    DeleteCustomer { id: CustomerId },
    Refresh,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignUp { .. } => "sign_up",
            Self::SignIn { .. } => "sign_in",
            Self::SignOut => "sign_out",
            Self::AddCustomer { .. } => "add_customer",
            Self::DeleteCustomer { .. } => "delete_customer",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Debug for BackendCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignUp { email, .. } | Self::SignIn { email, .. } => f
                .debug_struct(self.name())
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Self::AddCustomer { name } => f.debug_struct(self.name()).field("name", name).finish(),
            Self::DeleteCustomer { id } => f.debug_struct(self.name()).field("id", id).finish(),
            Self::SignOut | Self::Refresh => f.write_str(self.name()),
        }
    }
}
