//! GitHub App installation token tool
//!
//! Command-line front end over the token broker:
//! 1. `login` validates a PEM signing key and stores it encrypted
//! 2. `token` prints an installation access token (cached or exchanged)
//! 3. `status` reports whether the session holds credentials
//! 4. `logout` wipes both credentials
//!
//! Logs are JSON on stderr; stdout carries only command output.

mod cli;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use github_app_auth::{CredentialStore, FileStorage};
use token_broker::{AuthEvent, AuthState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        app_id = %config.app.id,
        owner = %config.repository.owner,
        repo = %config.repository.name,
        branch = %config.repository.branch,
        api_base = %config.api.base_url,
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let store = open_store(&config)?;
    let state = AuthState::init(store, config.broker_config(), http);

    match cli.command {
        Command::Login { key_file, persist } => {
            let pem = read_key(&key_file)?;
            github_app_auth::sign_app_jwt(&config.app.id, &pem).with_context(|| {
                format!("{} is not a usable RSA signing key", key_file.display())
            })?;
            state.set_secret(pem, persist);
            info!(persist, "signing key accepted");
            if !persist {
                warn!("key held in memory only; it is discarded when this process exits");
            }
        }
        Command::Token { key_file } => {
            if let Some(key_file) = key_file {
                state.set_secret(read_key(&key_file)?, false);
            }
            let mut events = state.events();
            match state.get_token().await {
                Ok(token) => println!("{token}"),
                Err(token_broker::Error::NotAuthenticated) => {
                    bail!("no signing key stored; run `app-token login --key-file PATH` first")
                }
                Err(e) if e.is_unauthorized() => {
                    bail!("GitHub rejected the App credentials ({e}); stored credentials were cleared")
                }
                Err(e) => {
                    if let Ok(AuthEvent::RateLimited { step }) = events.try_recv() {
                        warn!(?step, "GitHub is rate limiting token requests; wait before retrying");
                    }
                    return Err(e).context("failed to obtain installation token");
                }
            }
        }
        Command::Status => {
            let status = if state.refresh() {
                "authenticated"
            } else {
                "unauthenticated"
            };
            println!("{status}");
        }
        Command::Logout => {
            state.clear();
            info!("credentials cleared");
        }
    }

    Ok(())
}

/// Open file-backed session storage, degrading to no persistence on failure.
fn open_store(config: &Config) -> Result<CredentialStore> {
    let passphrase = config
        .session
        .passphrase
        .clone()
        .context("cipher passphrase was not resolved")?;

    let dir = config.storage_dir();
    match FileStorage::open(&dir) {
        Ok(storage) => Ok(CredentialStore::new(Arc::new(storage), passphrase)),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "session storage unavailable, credentials will not persist");
            Ok(CredentialStore::unavailable(passphrase))
        }
    }
}

fn read_key(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))
}
