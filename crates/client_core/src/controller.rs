//! Session & data controller: the single owner of the signed-in identity,
//! the form buffers and the customer cache.

use std::{fmt, sync::Arc};

use shared::domain::{Customer, CustomerId, Identity, NewCustomer};
use tracing::{debug, info, warn};

use crate::{
    auth::AuthProvider,
    error::{AuthError, ControllerError},
    prompt::{Notice, NoticeContext, NoticeKind, UserPrompt},
    records::RecordStore,
    session::SessionSubscription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// Declined before any external call: empty input or a "no" answer.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionView<'a> {
    SignedOut,
    SignedIn(&'a Identity),
}

/// Owned copy of the controller state, for rendering on another thread.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub identity: Option<Identity>,
    pub email: String,
    pub password: String,
    pub customer_name: String,
    pub customers: Vec<Customer>,
    pub cache_is_stale: bool,
}

impl fmt::Debug for ControllerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerSnapshot")
            .field("identity", &self.identity)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("customer_name", &self.customer_name)
            .field("customers", &self.customers.len())
            .field("cache_is_stale", &self.cache_is_stale)
            .finish()
    }
}

/// Mediates every call to the auth provider and the record store.
///
/// The signed-in state changes only when the provider's session notification
/// is applied (see [`CrmController::apply_session_change`]), never when a
/// sign-in or sign-out call returns. All methods take `&mut self`, so a
/// front-end drives the controller from one loop and no two external calls
/// overlap.
pub struct CrmController {
    auth: Arc<dyn AuthProvider>,
    records: Arc<dyn RecordStore>,
    prompt: Arc<dyn UserPrompt>,
    subscription: Option<SessionSubscription>,
    identity: Option<Identity>,
    email: String,
    password: String,
    customer_name: String,
    customers: Vec<Customer>,
}

impl CrmController {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        records: Arc<dyn RecordStore>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        Self {
            auth,
            records,
            prompt,
            subscription: None,
            identity: None,
            email: String::new(),
            password: String::new(),
            customer_name: String::new(),
            customers: Vec::new(),
        }
    }

    /// Registers the session observer. Calling it again keeps the existing one.
    pub fn start(&mut self) {
        if self.subscription.is_none() {
            self.subscription = Some(self.auth.subscribe());
            debug!("session observer registered");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Waits for the next session notification. Returns `None` when not
    /// started or once the provider has gone away.
    pub async fn next_session_change(&mut self) -> Option<Option<Identity>> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.changed().await,
            None => None,
        }
    }

    /// Replaces the identity wholesale. A present identity triggers one full
    /// refresh; an absent one leaves the cache as it is.
    pub async fn apply_session_change(
        &mut self,
        identity: Option<Identity>,
    ) -> Result<(), ControllerError> {
        let signed_in = identity.is_some();
        if let Some(identity) = &identity {
            info!(uid = %identity.uid, "session present");
        }
        self.identity = identity;

        if signed_in {
            return self.refresh().await;
        }
        if self.customers.is_empty() {
            info!("session absent");
        } else {
            warn!(
                cached = self.customers.len(),
                "session ended without sign-out; customer cache kept"
            );
        }
        Ok(())
    }

    /// Waits for one session notification and applies it. `None` means the
    /// subscription is closed.
    pub async fn sync_session(&mut self) -> Option<Result<(), ControllerError>> {
        let identity = self.next_session_change().await?;
        Some(self.apply_session_change(identity).await)
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn set_customer_name(&mut self, name: impl Into<String>) {
        self.customer_name = name.into();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub async fn sign_up(&mut self) -> Result<ActionOutcome, ControllerError> {
        let result = self.auth.create_account(&self.email, &self.password).await;
        self.finish_credentials("sign_up", result).await
    }

    pub async fn sign_in(&mut self) -> Result<ActionOutcome, ControllerError> {
        let result = self
            .auth
            .verify_credentials(&self.email, &self.password)
            .await;
        self.finish_credentials("sign_in", result).await
    }

    async fn finish_credentials(
        &mut self,
        operation: &'static str,
        result: Result<Identity, AuthError>,
    ) -> Result<ActionOutcome, ControllerError> {
        match result {
            Ok(identity) => {
                info!(operation, uid = %identity.uid, "credentials accepted");
                self.email.clear();
                self.password.clear();
                Ok(ActionOutcome::Completed)
            }
            Err(err) => {
                warn!(operation, code = err.code.as_str(), "credentials rejected");
                self.prompt.alert(&err.message).await;
                Err(err.into())
            }
        }
    }

    /// Ends the session, then empties the customer cache. This is the only
    /// place the cache is cleared.
    pub async fn sign_out(&mut self) -> Result<ActionOutcome, ControllerError> {
        if let Err(err) = self.auth.terminate_session().await {
            self.report(NoticeContext::SignOut, &err);
            return Err(err.into());
        }
        self.customers.clear();
        info!("signed out");
        Ok(ActionOutcome::Completed)
    }

    /// Inserts the name buffer as typed (surrounding whitespace is kept) and
    /// refreshes. A blank buffer is declined without calling the store.
    pub async fn add_customer(&mut self) -> Result<ActionOutcome, ControllerError> {
        if self.customer_name.trim().is_empty() {
            debug!("blank customer name; add skipped");
            return Ok(ActionOutcome::Skipped);
        }

        let customer = NewCustomer::new(self.customer_name.clone());
        match self.records.insert(customer).await {
            Ok(id) => info!(customer_id = %id, "customer added"),
            Err(err) => {
                self.report(NoticeContext::AddCustomer, &err);
                return Err(err.into());
            }
        }
        self.customer_name.clear();
        self.refresh().await?;
        Ok(ActionOutcome::Completed)
    }

    /// Asks for confirmation naming the customer, deletes it, then refreshes.
    pub async fn delete_customer(
        &mut self,
        id: &CustomerId,
    ) -> Result<ActionOutcome, ControllerError> {
        let label = self
            .customers
            .iter()
            .find(|customer| &customer.id == id)
            .map_or_else(|| id.to_string(), |customer| customer.name.clone());

        if !self.prompt.confirm(&format!("Delete {label}?")).await {
            debug!(customer_id = %id, "delete declined");
            return Ok(ActionOutcome::Skipped);
        }

        if let Err(err) = self.records.delete(id).await {
            self.report(NoticeContext::DeleteCustomer, &err);
            return Err(err.into());
        }
        info!(customer_id = %id, "customer deleted");
        self.refresh().await?;
        Ok(ActionOutcome::Completed)
    }

    /// Replaces the cache with the store's full current contents. On failure
    /// the cache is left untouched.
    pub async fn refresh(&mut self) -> Result<(), ControllerError> {
        match self.records.list_all().await {
            Ok(customers) => {
                debug!(count = customers.len(), "customer cache refreshed");
                self.customers = customers;
                Ok(())
            }
            Err(err) => {
                self.report(NoticeContext::Refresh, &err);
                Err(err.into())
            }
        }
    }

    pub fn view(&self) -> SessionView<'_> {
        match &self.identity {
            Some(identity) => SessionView::SignedIn(identity),
            None => SessionView::SignedOut,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    /// True while signed out but still holding customers from an earlier
    /// session, which happens when the session ends without [`Self::sign_out`].
    pub fn cache_is_stale(&self) -> bool {
        self.identity.is_none() && !self.customers.is_empty()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            identity: self.identity.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            customer_name: self.customer_name.clone(),
            customers: self.customers.clone(),
            cache_is_stale: self.cache_is_stale(),
        }
    }

    /// Releases the session observer. Dropping the controller does the same.
    pub fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        info!("controller shut down");
    }

    fn report<'e, E>(&self, context: NoticeContext, err: &'e E)
    where
        E: std::error::Error,
        NoticeKind: From<&'e E>,
    {
        let kind = NoticeKind::from(err);
        warn!(operation = context.label(), ?kind, error = %err, "operation failed");
        self.prompt.notify(Notice {
            context,
            kind,
            message: err.to_string(),
        });
    }
}
