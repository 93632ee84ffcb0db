//! Configuration: TOML file, environment overrides and defaults

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://camerachatbackend-production.up.railway.app";

/// Environment variables that override the file configuration
pub const ENV_API_BASE_URL: &str = "API_BASE_URL";
pub const ENV_PORT: &str = "PORT";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Upstream chat/streaming backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_join_timeout() -> u64 {
    5
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            join_timeout_secs: default_join_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// WebSocket endpoint: same host, `http` mapped to `ws` and `https` to `wss`
    pub fn ws_url(&self) -> Result<String> {
        let mut url = Url::parse(self.base_url())
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => bail!("Unsupported API base URL scheme: {}", other),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("Cannot map {} to a WebSocket URL", self.api_base_url))?;
        Ok(url.to_string().trim_end_matches('/').to_string())
    }
}

/// Auxiliary HTTP inspection surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Session registry lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 0 keeps credentials for the whole process lifetime
    #[serde(default)]
    pub credential_ttl_secs: u64,
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

fn default_prune_interval() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential_ttl_secs: 0,
            prune_interval_secs: default_prune_interval(),
        }
    }
}

impl SessionConfig {
    pub fn credential_ttl(&self) -> Option<Duration> {
        (self.credential_ttl_secs > 0).then(|| Duration::from_secs(self.credential_ttl_secs))
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}

impl Config {
    /// Default config file location: `~/.espstream/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".espstream").join("config.toml"))
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Load from an explicit path, or from the default path when it exists.
    /// Falls back to defaults when no file is found. Environment overrides
    /// are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::read_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::read_file(&p)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply `API_BASE_URL` and `PORT` overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.api_base_url = url.trim().to_string();
        }
        if let Some(port) = lookup(ENV_PORT).filter(|v| !v.trim().is_empty()) {
            self.gateway.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {}", ENV_PORT, port))?;
        }
        Ok(())
    }

    /// Reject base URLs the proxy cannot talk to
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.backend.base_url())
            .with_context(|| format!("Invalid API base URL: {}", self.backend.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "API base URL must use http or https, got {}",
                self.backend.api_base_url
            );
        }
        if self.backend.join_timeout_secs == 0 {
            bail!("backend.join_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
