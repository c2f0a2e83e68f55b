//! Hosted auth provider backed by the Firebase Identity Toolkit and Secure
//! Token REST endpoints.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Identity, UserId},
    error::{AuthErrorCode, ProviderError},
    protocol::{
        parse_expires_in, PasswordCredentialRequest, PasswordCredentialResponse,
        RefreshTokenRequest, RefreshTokenResponse,
    },
};
use storage::{PersistedSession, Storage};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    auth::{AuthProvider, IdTokenSource},
    error::AuthError,
    session::{SessionHub, SessionSubscription},
};

pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/";
pub const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/";
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToolkitEndpoints {
    identity_toolkit: Url,
    secure_token: Url,
}

impl IdentityToolkitEndpoints {
    pub fn production() -> Result<Self, url::ParseError> {
        Ok(Self {
            identity_toolkit: Url::parse(DEFAULT_IDENTITY_TOOLKIT_URL)?,
            secure_token: Url::parse(DEFAULT_SECURE_TOKEN_URL)?,
        })
    }

    /// Endpoints of the local auth emulator at `host` (`127.0.0.1:9099`).
    pub fn emulator(host: &str) -> Result<Self, url::ParseError> {
        let host = host.trim().trim_end_matches('/');
        Ok(Self {
            identity_toolkit: Url::parse(&format!("http://{host}/identitytoolkit.googleapis.com/"))?,
            secure_token: Url::parse(&format!("http://{host}/securetoken.googleapis.com/"))?,
        })
    }

    /// Both bases must end with `/`.
    pub fn with_base(identity_toolkit: Url, secure_token: Url) -> Self {
        Self {
            identity_toolkit,
            secure_token,
        }
    }

    fn sign_up(&self) -> Result<Url, url::ParseError> {
        self.identity_toolkit.join("v1/accounts:signUp")
    }

    fn sign_in_with_password(&self) -> Result<Url, url::ParseError> {
        self.identity_toolkit.join("v1/accounts:signInWithPassword")
    }

    fn token(&self) -> Result<Url, url::ParseError> {
        self.secure_token.join("v1/token")
    }
}

pub struct IdentityToolkitAuth {
    http: Client,
    api_key: String,
    endpoints: IdentityToolkitEndpoints,
    hub: SessionHub,
    persistence: Option<Storage>,
    session: Mutex<Option<PersistedSession>>,
}

impl IdentityToolkitAuth {
    pub fn new(api_key: impl Into<String>, endpoints: IdentityToolkitEndpoints) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            endpoints,
            hub: SessionHub::default(),
            persistence: None,
            session: Mutex::new(None),
        }
    }

    /// Keeps the signed-in credential in `storage` so [`Self::restore`] can
    /// resume it after a restart.
    pub fn with_persistence(mut self, storage: Storage) -> Self {
        self.persistence = Some(storage);
        self
    }

    pub fn persistence_key(&self) -> String {
        persistence_key(&self.api_key)
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    /// Resumes a stored credential by exchanging its refresh token.
    ///
    /// A rejected refresh token discards the credential and publishes a
    /// signed-out session. A transport failure keeps the credential for the
    /// next attempt.
    pub async fn restore(&self) -> Result<Option<Identity>, AuthError> {
        let Some(storage) = &self.persistence else {
            return Ok(None);
        };
        let key = self.persistence_key();
        let stored = match storage.load_session(&key).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "failed to load persisted session");
                return Ok(None);
            }
        };
        let Some(stored) = stored else {
            debug!("no persisted session");
            return Ok(None);
        };

        let mut guard = self.session.lock().await;
        match self.refresh_tokens(&stored.refresh_token).await {
            Ok(refreshed) => {
                let session = refreshed_session(&stored, refreshed);
                let identity = session.identity();
                self.persist(&session).await;
                *guard = Some(session);
                drop(guard);
                info!(uid = %identity.uid, "persisted session restored");
                self.hub.publish(Some(identity.clone()));
                Ok(Some(identity))
            }
            Err(err) if err.code.ends_session() => {
                warn!(code = err.code.as_str(), "persisted session rejected; discarding it");
                *guard = None;
                drop(guard);
                self.forget_persisted().await;
                self.hub.publish(None);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn password_exchange(
        &self,
        endpoint: Result<Url, url::ParseError>,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let url = endpoint.map_err(|err| {
            error!(error = %err, "invalid identity toolkit endpoint");
            AuthError::from_code(AuthErrorCode::InternalError)
        })?;
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&PasswordCredentialRequest::new(email, password))
            .send()
            .await
            .map_err(AuthError::network)?;
        let body: PasswordCredentialResponse = decode_auth_response(response).await?;

        let lifetime = parse_expires_in(&body.expires_in).unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let session = PersistedSession {
            uid: UserId(body.local_id.clone()),
            email: body.email.clone(),
            id_token: body.id_token.clone(),
            refresh_token: body.refresh_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        };
        let identity = body.identity();

        self.persist(&session).await;
        *self.session.lock().await = Some(session);
        self.hub.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<RefreshTokenResponse, AuthError> {
        let url = self.endpoints.token().map_err(|err| {
            error!(error = %err, "invalid secure token endpoint");
            AuthError::from_code(AuthErrorCode::InternalError)
        })?;
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .form(&RefreshTokenRequest::new(refresh_token))
            .send()
            .await
            .map_err(AuthError::network)?;
        decode_auth_response(response).await
    }

    async fn persist(&self, session: &PersistedSession) {
        if let Some(storage) = &self.persistence {
            if let Err(err) = storage.save_session(&self.persistence_key(), session).await {
                warn!(error = %err, "failed to persist session; it will not survive a restart");
            }
        }
    }

    async fn forget_persisted(&self) {
        if let Some(storage) = &self.persistence {
            if let Err(err) = storage.clear_session(&self.persistence_key()).await {
                warn!(error = %err, "failed to clear persisted session");
            }
        }
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.password_exchange(self.endpoints.sign_up(), email, password)
            .await
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.password_exchange(self.endpoints.sign_in_with_password(), email, password)
            .await
    }

    async fn terminate_session(&self) -> Result<(), AuthError> {
        let previous = self.session.lock().await.take();
        self.forget_persisted().await;
        if let Some(previous) = previous {
            info!(uid = %previous.uid, "session terminated");
        }
        self.hub.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }
}

#[async_trait]
impl IdTokenSource for IdentityToolkitAuth {
    /// Returns the current id token, refreshing it shortly before expiry. A
    /// rejected refresh ends the session.
    async fn id_token(&self) -> Result<Option<String>, AuthError> {
        let mut guard = self.session.lock().await;
        let Some(current) = guard.as_ref() else {
            return Ok(None);
        };
        if !current.expires_within(Utc::now(), Duration::seconds(TOKEN_REFRESH_SKEW_SECS)) {
            return Ok(Some(current.id_token.clone()));
        }

        let stored = current.clone();
        match self.refresh_tokens(&stored.refresh_token).await {
            Ok(refreshed) => {
                let session = refreshed_session(&stored, refreshed);
                let token = session.id_token.clone();
                self.persist(&session).await;
                *guard = Some(session);
                debug!(uid = %stored.uid, "id token refreshed");
                Ok(Some(token))
            }
            Err(err) if err.code.ends_session() => {
                warn!(uid = %stored.uid, code = err.code.as_str(), "session ended by provider");
                *guard = None;
                drop(guard);
                self.forget_persisted().await;
                self.hub.publish(None);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

/// Key under which the credential for `api_key` is stored.
pub fn persistence_key(api_key: &str) -> String {
    format!("{api_key}:[DEFAULT]")
}

fn refreshed_session(stored: &PersistedSession, refreshed: RefreshTokenResponse) -> PersistedSession {
    let lifetime = parse_expires_in(&refreshed.expires_in).unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    PersistedSession {
        uid: UserId(refreshed.user_id),
        email: stored.email.clone(),
        id_token: refreshed.id_token,
        refresh_token: refreshed.refresh_token,
        expires_at: Utc::now() + Duration::seconds(lifetime),
    }
}

async fn decode_auth_response<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let provider_error = ProviderError::from_body(status.as_u16(), &body);
        debug!(status = status.as_u16(), reason = %provider_error.message, "auth request rejected");
        return Err(AuthError::from_server_reason(&provider_error.message));
    }
    response.json::<T>().await.map_err(|err| {
        error!(error = %err, "undecodable auth response");
        AuthError::from_code(AuthErrorCode::InternalError)
    })
}

#[cfg(test)]
#[path = "tests/identity_toolkit_tests.rs"]
mod tests;
