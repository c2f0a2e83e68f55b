//! Wiring of auth provider and record store pairs for the front-ends.

use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::Context;
use storage::Storage;
use tracing::{info, warn};

use crate::{
    auth::AuthProvider,
    config::{load_settings, BackendSettings},
    firestore::FirestoreRecordStore,
    identity_toolkit::IdentityToolkitAuth,
    memory::{InMemoryAuthProvider, InMemoryRecordStore},
    records::RecordStore,
};

pub struct Backends {
    pub auth: Arc<dyn AuthProvider>,
    pub records: Arc<dyn RecordStore>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Memory,
    Firebase,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "firebase" => Ok(Self::Firebase),
            other => Err(format!(
                "unknown backend '{other}' (expected 'memory' or 'firebase')"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Firebase => "firebase",
        })
    }
}

/// Launch flags shared by the front-ends.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub backend: BackendKind,
    pub config_path: Option<PathBuf>,
    /// Overrides the session database from settings.
    pub session_db: Option<String>,
}

pub async fn open_backends(options: &LaunchOptions) -> anyhow::Result<Backends> {
    match options.backend {
        BackendKind::Memory => {
            info!("using in-memory backends");
            Ok(memory_backends())
        }
        BackendKind::Firebase => {
            let mut settings = load_settings(options.config_path.as_deref())
                .context("failed to load backend settings")?;
            if let Some(session_db) = &options.session_db {
                settings.session_database_url = session_db.clone();
            }
            hosted_backends(&settings).await
        }
    }
}

/// Process-local backends; nothing survives a restart.
pub fn memory_backends() -> Backends {
    Backends {
        auth: Arc::new(InMemoryAuthProvider::new()),
        records: Arc::new(InMemoryRecordStore::new()),
    }
}

/// Identity Toolkit + Firestore backends. Restores a persisted session before
/// returning, so the first session notification may already be signed in.
pub async fn hosted_backends(settings: &BackendSettings) -> anyhow::Result<Backends> {
    settings.validate()?;

    let database_url = settings.session_database_url();
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open session database '{database_url}'"))?;

    let auth = Arc::new(
        IdentityToolkitAuth::new(&settings.api_key, settings.identity_toolkit_endpoints()?)
            .with_persistence(storage),
    );
    match auth.restore().await {
        Ok(Some(identity)) => info!(uid = %identity.uid, "resuming persisted session"),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "could not resume persisted session"),
    }

    let records = FirestoreRecordStore::new(
        &settings.firestore_base_url()?,
        &settings.project_id,
        &settings.collection,
        auth.clone(),
    )
    .context("failed to build firestore collection url")?;
    info!(
        project_id = %settings.project_id,
        collection = %settings.collection,
        "hosted backends ready"
    );

    Ok(Backends {
        auth,
        records: Arc::new(records),
    })
}

#[cfg(test)]
#[path = "tests/backends_tests.rs"]
mod tests;
