use anyhow::{Context, Result, bail};
use airflow::Credentials;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::ConnectionArgs;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("airflow-users"))
}

/// Expand `~` in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Connection and storage settings.
///
/// Loaded from `config.toml`; command-line flags and `AIRFLOW_*` environment
/// variables take precedence over the file.
#[derive(Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Airflow API base URL
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    /// State file location
    pub state_file: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "***");
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("token", &redact(&self.token))
            .field("timeout_secs", &self.timeout_secs)
            .field("state_file", &self.state_file)
            .finish()
    }
}

impl Config {
    /// Load the config file.
    ///
    /// An explicit path must exist; the default path may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (config_dir()?.join("config.toml"), false),
        };

        if !path.exists() {
            if required {
                bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn merge(mut self, args: &ConnectionArgs) -> Self {
        if let Some(url) = &args.url {
            self.url = Some(url.clone());
        }
        if let Some(username) = &args.username {
            self.username = Some(username.clone());
        }
        if let Some(password) = &args.password {
            self.password = Some(password.clone());
        }
        if let Some(token) = &args.token {
            self.token = Some(token.clone());
        }
        if let Some(timeout) = args.timeout {
            self.timeout_secs = Some(timeout);
        }
        self
    }

    /// The API base URL, which has no default
    pub fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .context("No Airflow URL configured; pass --url or set AIRFLOW_URL")
    }

    /// Bearer token wins over basic auth; neither means anonymous
    pub fn credentials(&self) -> Credentials {
        if let Some(token) = &self.token {
            return Credentials::Bearer(token.clone());
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            (Some(username), None) => {
                log::warn!("Username {username} configured without a password; sending no credentials");
                Credentials::Anonymous
            }
            _ => Credentials::Anonymous,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map_or(airflow::backend::http::DEFAULT_TIMEOUT, Duration::from_secs)
    }

    /// State file path: explicit override, then config, then the default
    pub fn state_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        match &self.state_file {
            Some(path) => Ok(expand_path(path)),
            None => crate::state::StateFile::default_path(),
        }
    }
}
