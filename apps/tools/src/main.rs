use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, normalize_database_url},
    identity_toolkit::persistence_key,
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Inspect or clear persisted CRM sessions")]
struct Cli {
    /// Settings file (defaults to ./crm.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session database URL or path, overriding the settings.
    #[arg(long)]
    session_db: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored credentials without printing their tokens.
    ShowSession,
    /// Remove the stored credential for one API key, or all of them.
    ClearSession {
        #[arg(long, conflicts_with = "all")]
        api_key: Option<String>,
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref())?;
    let database_url = match &cli.session_db {
        Some(url) => normalize_database_url(url),
        None => settings.session_database_url(),
    };
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open session database '{database_url}'"))?;
    info!(database_url = %database_url, "session database opened");

    match cli.command {
        Command::ShowSession => {
            let sessions = storage.list_sessions().await?;
            if sessions.is_empty() {
                println!("no persisted sessions in {database_url}");
            }
            let now = Utc::now();
            for session in sessions {
                let state = if session.expires_at <= now {
                    "id token expired; refresh on next start"
                } else {
                    "id token valid"
                };
                println!(
                    "{}  uid={}  email={}  expires_at={}  ({state})  updated_at={}",
                    session.persistence_key,
                    session.uid,
                    session.email,
                    session.expires_at.to_rfc3339(),
                    session.updated_at
                );
            }
        }
        Command::ClearSession { api_key, all } => {
            if all {
                let removed = storage.clear_all_sessions().await?;
                println!("removed {removed} persisted session(s)");
            } else {
                let api_key = api_key.unwrap_or(settings.api_key);
                if api_key.trim().is_empty() {
                    anyhow::bail!("no api key given; pass --api-key, set FIREBASE_API_KEY, or use --all");
                }
                let key = persistence_key(&api_key);
                if storage.clear_session(&key).await? {
                    println!("removed persisted session {key}");
                } else {
                    println!("no persisted session for {key}");
                }
            }
        }
    }

    Ok(())
}
