//! Process-local auth provider and record store, used by the demo backend and tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use shared::{
    domain::{Customer, CustomerId, Identity, NewCustomer, UserId},
    error::AuthErrorCode,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    auth::AuthProvider,
    error::{AuthError, DataError},
    records::RecordStore,
    session::{SessionHub, SessionSubscription},
};

const MIN_PASSWORD_LEN: usize = 6;
const DOCUMENT_ID_LEN: usize = 20;

struct StoredAccount {
    uid: UserId,
    email: String,
    password: String,
}

#[derive(Default)]
struct InMemoryAuthState {
    accounts: HashMap<String, StoredAccount>,
    fail_next: Option<AuthError>,
}

/// Auth provider holding accounts in memory. Applies the same password policy
/// and reports the same error codes as the hosted provider.
pub struct InMemoryAuthProvider {
    hub: SessionHub,
    inner: Mutex<InMemoryAuthState>,
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            hub: SessionHub::default(),
            inner: Mutex::new(InMemoryAuthState::default()),
        }
    }

    /// Creates an account without signing it in.
    pub async fn seed_account(&self, email: &str, password: &str) -> Identity {
        let mut guard = self.inner.lock().await;
        let account = new_account(email, password);
        let identity = account_identity(&account);
        guard.accounts.insert(normalize_email(email), account);
        identity
    }

    /// Marks `identity` as already signed in, as a provider does when it
    /// restores a saved credential before anyone subscribes.
    pub fn restore_session(&self, identity: Identity) {
        self.hub.publish(Some(identity));
    }

    /// Ends the session from the provider side, without a sign-out call.
    pub fn expire_session(&self) {
        self.hub.publish(None);
    }

    /// Makes the next auth operation fail with `err`.
    pub async fn fail_next(&self, err: AuthError) {
        self.inner.lock().await.fail_next = Some(err);
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    async fn take_failure(&self) -> Option<AuthError> {
        self.inner.lock().await.fail_next.take()
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        check_email(email)?;
        if password.is_empty() {
            return Err(AuthError::from_code(AuthErrorCode::MissingPassword));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::from_server_reason(
                "WEAK_PASSWORD : Password should be at least 6 characters",
            ));
        }

        let identity = {
            let mut guard = self.inner.lock().await;
            let key = normalize_email(email);
            if guard.accounts.contains_key(&key) {
                return Err(AuthError::from_code(AuthErrorCode::EmailAlreadyInUse));
            }
            let account = new_account(email, password);
            let identity = account_identity(&account);
            guard.accounts.insert(key, account);
            identity
        };

        self.hub.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        check_email(email)?;
        if password.is_empty() {
            return Err(AuthError::from_code(AuthErrorCode::MissingPassword));
        }

        let identity = {
            let guard = self.inner.lock().await;
            match guard.accounts.get(&normalize_email(email)) {
                Some(account) if account.password == password => account_identity(account),
                _ => return Err(AuthError::from_code(AuthErrorCode::InvalidCredential)),
            }
        };

        self.hub.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn terminate_session(&self) -> Result<(), AuthError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        self.hub.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn check_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::from_code(AuthErrorCode::MissingEmail));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::from_code(AuthErrorCode::InvalidEmail)),
    }
}

fn new_account(email: &str, password: &str) -> StoredAccount {
    StoredAccount {
        uid: UserId(Uuid::new_v4().simple().to_string()),
        email: normalize_email(email),
        password: password.to_string(),
    }
}

fn account_identity(account: &StoredAccount) -> Identity {
    Identity {
        uid: account.uid.clone(),
        email: account.email.clone(),
    }
}

/// Customer collection held in memory, listed in document-id order.
#[derive(Default)]
pub struct InMemoryRecordStore {
    documents: Mutex<BTreeMap<CustomerId, String>>,
    unavailable: AtomicBool,
    list_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a document directly, as another client sharing the collection would.
    pub async fn insert_external(&self, name: &str) -> CustomerId {
        let id = new_document_id();
        self.documents
            .lock()
            .await
            .insert(id.clone(), name.to_string());
        id
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }

    fn check_available(&self) -> Result<(), DataError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DataError::Transport("record store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_all(&self) -> Result<Vec<Customer>, DataError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let documents = self.documents.lock().await;
        Ok(documents
            .iter()
            .map(|(id, name)| Customer {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn insert(&self, customer: NewCustomer) -> Result<CustomerId, DataError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let id = new_document_id();
        self.documents
            .lock()
            .await
            .insert(id.clone(), customer.name);
        Ok(id)
    }

    async fn delete(&self, id: &CustomerId) -> Result<(), DataError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        // Deleting a missing document succeeds, as in Firestore.
        self.documents.lock().await.remove(id);
        Ok(())
    }
}

fn new_document_id() -> CustomerId {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(DOCUMENT_ID_LEN);
    CustomerId(id)
}
