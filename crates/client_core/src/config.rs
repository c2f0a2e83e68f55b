//! Backend settings: defaults, then an optional TOML file, then environment.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    firestore::DEFAULT_FIRESTORE_URL,
    identity_toolkit::IdentityToolkitEndpoints,
};

pub const DEFAULT_SETTINGS_FILE: &str = "crm.toml";
pub const DEFAULT_COLLECTION: &str = "customers";
pub const DEFAULT_SESSION_DATABASE_URL: &str = "sqlite://./data/session.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub api_key: String,
    pub project_id: String,
    pub auth_domain: Option<String>,
    pub collection: String,
    pub auth_emulator_host: Option<String>,
    pub firestore_emulator_host: Option<String>,
    pub session_database_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            auth_domain: None,
            collection: DEFAULT_COLLECTION.to_string(),
            auth_emulator_host: None,
            firestore_emulator_host: None,
            session_database_url: DEFAULT_SESSION_DATABASE_URL.to_string(),
        }
    }
}

/// Keys accepted in the settings file. The camelCase aliases let a web
/// `firebaseConfig` object be pasted in as TOML.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    #[serde(alias = "apiKey")]
    api_key: Option<String>,
    #[serde(alias = "projectId")]
    project_id: Option<String>,
    #[serde(alias = "authDomain")]
    auth_domain: Option<String>,
    collection: Option<String>,
    auth_emulator_host: Option<String>,
    firestore_emulator_host: Option<String>,
    session_database_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid {name} '{value}': {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },
}

/// Loads settings from `path` (or `crm.toml` when present) and the process
/// environment.
pub fn load_settings(path: Option<&Path>) -> Result<BackendSettings, SettingsError> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<BackendSettings, SettingsError> {
    let mut settings = BackendSettings::default();

    let file = match path {
        Some(path) => Some(read_file(path)?),
        None => {
            let default_path = Path::new(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                Some(read_file(default_path)?)
            } else {
                None
            }
        }
    };

    if let Some(file) = file {
        if let Some(v) = file.api_key {
            settings.api_key = v;
        }
        if let Some(v) = file.project_id {
            settings.project_id = v;
        }
        if let Some(v) = file.auth_domain {
            settings.auth_domain = Some(v);
        }
        if let Some(v) = file.collection {
            settings.collection = v;
        }
        if let Some(v) = file.auth_emulator_host {
            settings.auth_emulator_host = Some(v);
        }
        if let Some(v) = file.firestore_emulator_host {
            settings.firestore_emulator_host = Some(v);
        }
        if let Some(v) = file.session_database_url {
            settings.session_database_url = v;
        }
    }

    if let Some(v) = env("FIREBASE_API_KEY") {
        settings.api_key = v;
    }
    if let Some(v) = env("FIREBASE_PROJECT_ID") {
        settings.project_id = v;
    }
    if let Some(v) = env("FIREBASE_AUTH_DOMAIN") {
        settings.auth_domain = Some(v);
    }
    if let Some(v) = env("FIREBASE_AUTH_EMULATOR_HOST") {
        settings.auth_emulator_host = Some(v);
    }
    if let Some(v) = env("FIRESTORE_EMULATOR_HOST") {
        settings.firestore_emulator_host = Some(v);
    }

    if let Some(v) = env("CRM__COLLECTION") {
        settings.collection = v;
    }
    if let Some(v) = env("APP__COLLECTION") {
        settings.collection = v;
    }

    if let Some(v) = env("CRM__SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }
    if let Some(v) = env("APP__SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }

    Ok(settings)
}

fn read_file(path: &Path) -> Result<FileSettings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl BackendSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api_key.trim().is_empty() {
            return Err(SettingsError::Missing("api_key"));
        }
        if self.project_id.trim().is_empty() {
            return Err(SettingsError::Missing("project_id"));
        }
        if self.collection.trim().is_empty() {
            return Err(SettingsError::Missing("collection"));
        }
        Ok(())
    }

    pub fn identity_toolkit_endpoints(&self) -> Result<IdentityToolkitEndpoints, SettingsError> {
        let (endpoints, value) = match &self.auth_emulator_host {
            Some(host) => (IdentityToolkitEndpoints::emulator(host), host.clone()),
            None => (
                IdentityToolkitEndpoints::production(),
                "production".to_string(),
            ),
        };
        endpoints.map_err(|source| SettingsError::InvalidUrl {
            name: "auth emulator host",
            value,
            source,
        })
    }

    pub fn firestore_base_url(&self) -> Result<Url, SettingsError> {
        let raw = match &self.firestore_emulator_host {
            Some(host) => format!("http://{}/", host.trim().trim_end_matches('/')),
            None => DEFAULT_FIRESTORE_URL.to_string(),
        };
        Url::parse(&raw).map_err(|source| SettingsError::InvalidUrl {
            name: "firestore url",
            value: raw.clone(),
            source,
        })
    }

    pub fn session_database_url(&self) -> String {
        normalize_database_url(&self.session_database_url)
    }
}

/// Turns a plain path or a `sqlite:` shorthand into a `sqlite://` URL.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_SESSION_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
