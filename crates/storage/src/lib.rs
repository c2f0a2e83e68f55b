use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Identity, UserId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Credential the auth adapter keeps so a restarted app resumes its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub uid: UserId,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl PersistedSession {
    pub fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            email: self.email.clone(),
        }
    }

    /// True once `now` is within `skew` of the id token's expiry.
    pub fn expires_within(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at - skew <= now
    }
}

#[derive(Debug, Clone)]
pub struct StoredSessionSummary {
    pub persistence_key: String,
    pub uid: UserId,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub updated_at: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let max_connections = if database_url.starts_with("sqlite::memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn save_session(&self, persistence_key: &str, session: &PersistedSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO persisted_sessions
                 (persistence_key, uid, email, id_token, refresh_token, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(persistence_key) DO UPDATE SET
                 uid = excluded.uid,
                 email = excluded.email,
                 id_token = excluded.id_token,
                 refresh_token = excluded.refresh_token,
                 expires_at = excluded.expires_at,
                 updated_at = CURRENT_TIMESTAMP",
        )
        .bind(persistence_key)
        .bind(session.uid.as_str())
        .bind(&session.email)
        .bind(&session.id_token)
        .bind(&session.refresh_token)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to persist session for key '{persistence_key}'"))?;
        Ok(())
    }

    pub async fn load_session(&self, persistence_key: &str) -> Result<Option<PersistedSession>> {
        let row = sqlx::query(
            "SELECT uid, email, id_token, refresh_token, expires_at
             FROM persisted_sessions WHERE persistence_key = ?",
        )
        .bind(persistence_key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load session for key '{persistence_key}'"))?;

        row.map(|row| -> Result<PersistedSession> {
            Ok(PersistedSession {
                uid: UserId(row.try_get("uid")?),
                email: row.try_get("email")?,
                id_token: row.try_get("id_token")?,
                refresh_token: row.try_get("refresh_token")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    /// Removes the stored credential. Returns whether one existed.
    pub async fn clear_session(&self, persistence_key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM persisted_sessions WHERE persistence_key = ?")
            .bind(persistence_key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear session for key '{persistence_key}'"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_all_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM persisted_sessions")
            .execute(&self.pool)
            .await
            .context("failed to clear persisted sessions")?;
        Ok(result.rows_affected())
    }

    pub async fn list_sessions(&self) -> Result<Vec<StoredSessionSummary>> {
        let rows = sqlx::query(
            "SELECT persistence_key, uid, email, expires_at, updated_at
             FROM persisted_sessions ORDER BY persistence_key",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list persisted sessions")?;

        rows.into_iter()
            .map(|row| {
                Ok(StoredSessionSummary {
                    persistence_key: row.try_get("persistence_key")?,
                    uid: UserId(row.try_get("uid")?),
                    email: row.try_get("email")?,
                    expires_at: row.try_get("expires_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
