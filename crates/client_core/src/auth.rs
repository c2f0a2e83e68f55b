use async_trait::async_trait;
use shared::domain::Identity;

use crate::{error::AuthError, session::SessionSubscription};

/// External service that issues and verifies credentials and owns session state.
///
/// Successful calls also publish the new session state to subscribers; callers
/// must not treat the returned identity as the session transition itself.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    async fn verify_credentials(&self, email: &str, password: &str)
        -> Result<Identity, AuthError>;
    async fn terminate_session(&self) -> Result<(), AuthError>;
    fn subscribe(&self) -> SessionSubscription;
}

/// Source of bearer tokens for requests made on behalf of the signed-in user.
#[async_trait]
pub trait IdTokenSource: Send + Sync {
    /// Returns `Ok(None)` when nobody is signed in.
    async fn id_token(&self) -> Result<Option<String>, AuthError>;
}

/// Token source for stores that accept anonymous requests.
pub struct AnonymousTokens;

#[async_trait]
impl IdTokenSource for AnonymousTokens {
    async fn id_token(&self) -> Result<Option<String>, AuthError> {
        Ok(None)
    }
}
