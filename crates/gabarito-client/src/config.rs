//! Client configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gabarito_core::session::FileSessionStorage;

use crate::http::HttpBackend;

/// Top-level gabarito configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the exam-correction backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Where the session token is kept between runs.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_session_file() -> PathBuf {
    dirs_path()
        .map(|d| d.join("session.json"))
        .unwrap_or_else(|| PathBuf::from(".gabarito-session.json"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            session_file: default_session_file(),
        }
    }
}

impl ClientConfig {
    /// HTTP backend for this configuration.
    pub fn backend(&self) -> Result<HttpBackend> {
        HttpBackend::new(&self.base_url, self.timeout_secs)
    }

    /// Session storage for this configuration.
    pub fn session_storage(&self) -> FileSessionStorage {
        FileSessionStorage::new(&self.session_file)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `gabarito.toml` in the current directory
/// 2. `~/.config/gabarito/config.toml`
///
/// Environment variable overrides: `GABARITO_API_URL`, `GABARITO_SESSION_FILE`.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("gabarito.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|d| d.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ClientConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    if let Ok(url) = std::env::var("GABARITO_API_URL") {
        config.base_url = url;
    }
    if let Ok(file) = std::env::var("GABARITO_SESSION_FILE") {
        config.session_file = PathBuf::from(file);
    }

    config.base_url = resolve_env_vars(&config.base_url)
        .trim_end_matches('/')
        .to_string();
    config.session_file = PathBuf::from(resolve_env_vars(&config.session_file.to_string_lossy()));

    if config.base_url.is_empty() {
        anyhow::bail!("base_url must not be empty");
    }
    if config.timeout_secs == 0 {
        anyhow::bail!("timeout_secs must be greater than zero");
    }

    Ok(config)
}

/// `~/.config/gabarito`.
pub fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gabarito"))
}
