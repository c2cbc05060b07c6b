//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The cipher passphrase is never read from the TOML itself. It comes from
//! APP_TOKEN_ENCRYPT_KEY, then passphrase_file, then the value embedded at
//! build time.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use token_broker::BrokerConfig;

/// Env var carrying the cipher passphrase, at runtime or at build time.
pub const PASSPHRASE_ENV: &str = "APP_TOKEN_ENCRYPT_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// GitHub App identity
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub id: String,
}

/// Repository the installation token is scoped to
#[derive(Debug, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    /// Branch content collaborators write to
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            name: String::new(),
            branch: default_branch(),
        }
    }
}

/// REST API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Session storage and cipher settings
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// Directory for session entries; defaults to $XDG_RUNTIME_DIR/app-token
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    /// File holding the cipher passphrase (alternative to APP_TOKEN_ENCRYPT_KEY)
    #[serde(default)]
    pub passphrase_file: Option<PathBuf>,
    #[serde(skip)]
    pub passphrase: Option<Secret<String>>,
}

fn default_branch() -> String {
    "main".into()
}

fn default_base_url() -> String {
    github_app_auth::GITHUB_API_URL.into()
}

fn default_timeout() -> u64 {
    30
}

/// Overlay a non-empty env var onto a config field.
fn overlay_env(field: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        let value = value.trim();
        if !value.is_empty() {
            *field = value.to_owned();
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        overlay_env(&mut config.app.id, "GITHUB_APP_ID");
        overlay_env(&mut config.repository.owner, "GITHUB_OWNER");
        overlay_env(&mut config.repository.name, "GITHUB_REPO");
        overlay_env(&mut config.repository.branch, "GITHUB_BRANCH");

        for (field, value) in [
            ("app.id", &config.app.id),
            ("repository.owner", &config.repository.owner),
            ("repository.name", &config.repository.name),
        ] {
            if value.trim().is_empty() {
                return Err(common::Error::Config(format!("{field} must not be empty")));
            }
        }

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        config.session.passphrase = Some(resolve_passphrase(&config.session)?);
        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("app-token.toml")
    }

    /// Session storage directory: configured, else the per-user runtime dir.
    pub fn storage_dir(&self) -> PathBuf {
        if let Some(dir) = &self.session.storage_dir {
            return dir.clone();
        }
        match std::env::var_os("XDG_RUNTIME_DIR") {
            Some(runtime) if !runtime.is_empty() => PathBuf::from(runtime).join("app-token"),
            _ => std::env::temp_dir().join("app-token"),
        }
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::new(
            self.app.id.clone(),
            self.repository.owner.clone(),
            self.repository.name.clone(),
        )
        .with_api_base(self.api.base_url.clone())
    }
}

/// Passphrase resolution: env var, then file, then build-time value.
fn resolve_passphrase(session: &SessionConfig) -> common::Result<Secret<String>> {
    if let Ok(value) = std::env::var(PASSPHRASE_ENV) {
        if !value.is_empty() {
            return Ok(Secret::new(value));
        }
    }

    if let Some(ref file) = session.passphrase_file {
        let value = std::fs::read_to_string(file).map_err(|e| {
            common::Error::Config(format!(
                "failed to read passphrase_file {}: {e}",
                file.display()
            ))
        })?;
        let value = value.trim();
        if value.is_empty() {
            return Err(common::Error::Config(format!(
                "passphrase_file {} is empty",
                file.display()
            )));
        }
        return Ok(Secret::from(value));
    }

    match option_env!("APP_TOKEN_ENCRYPT_KEY") {
        Some(value) if !value.is_empty() => Ok(Secret::from(value)),
        _ => Err(common::Error::Config(format!(
            "no cipher passphrase: set {PASSPHRASE_ENV} or session.passphrase_file"
        ))),
    }
}
