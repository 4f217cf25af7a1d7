//! Configuration for remote source access.
//!
//! Values come from, in order of precedence: fields set in code, a TOML file
//! ([`RemoteConfig::load`]), the environment, and defaults.

use crate::error::{RemoteError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the cache home directory.
pub const CACHE_HOME_ENV: &str = "LOCUS_CACHE_HOME";

/// When true, constructing a [`Remote`](crate::Remote) fails.
pub const DISABLE_INSECURE_FEATURES_ENV: &str = "LOCUS_DISABLE_INSECURE_FEATURES";

/// Subdirectory of the user cache directory used as cache home.
pub const CACHE_DIR_NAME: &str = "locus";

/// Relative cache home used when no user cache directory is known.
pub const FALLBACK_CACHE_DIR: &str = ".locus";

/// Configuration for remote source access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    /// Cache home. Resolved by [`RemoteConfig::resolve_home`] when unset.
    pub home: Option<PathBuf>,

    /// Refuse to handle remote sources at all.
    pub disable_insecure_features: bool,

    /// Network settings.
    pub network: NetworkConfig,

    /// Git settings.
    pub git: GitConfig,

    /// Object storage settings.
    pub storage: StorageConfig,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum number of redirects to follow.
    pub max_redirects: u32,

    /// User agent string.
    pub user_agent: Option<String>,

    /// HTTP proxy URL.
    pub http_proxy: Option<String>,

    /// HTTPS proxy URL.
    pub https_proxy: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_redirects: 10,
            user_agent: None,
            http_proxy: None,
            https_proxy: None,
        }
    }
}

/// Git configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitConfig {
    /// Git executable.
    pub program: String,

    /// Whether to use shallow clones.
    pub shallow: bool,

    /// Clone depth for shallow clones.
    pub depth: u32,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            shallow: true,
            depth: 1,
        }
    }
}

/// Object storage configuration.
///
/// Credentials are never configured here; the AWS CLI picks up whatever the
/// environment provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// AWS CLI executable.
    pub program: String,

    /// Named profile passed as `--profile`.
    pub profile: Option<String>,

    /// Custom endpoint passed as `--endpoint-url`.
    pub endpoint_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            profile: None,
            endpoint_url: None,
        }
    }
}

impl RemoteConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Load a TOML file and overlay the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?.apply_env())
    }

    /// Parse TOML without consulting the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RemoteError::Config(e.to_string()))
    }

    /// Fill unset values from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Fill unset values using `lookup` as the environment.
    ///
    /// The home directory is only taken from the environment when none is
    /// configured. The disable switch can only be turned on, never off.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.home.is_none() {
            self.home = lookup(CACHE_HOME_ENV)
                .filter(|h| !h.is_empty())
                .map(PathBuf::from);
        }
        if lookup(DISABLE_INSECURE_FEATURES_ENV)
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(false)
        {
            self.disable_insecure_features = true;
        }
        self
    }

    /// The cache home: the configured one, else the user cache directory
    /// joined with [`CACHE_DIR_NAME`], else [`FALLBACK_CACHE_DIR`].
    pub fn resolve_home(&self) -> PathBuf {
        if let Some(home) = &self.home {
            return home.clone();
        }
        match dirs::cache_dir() {
            Some(dir) => dir.join(CACHE_DIR_NAME),
            None => PathBuf::from(FALLBACK_CACHE_DIR),
        }
    }
}

/// Parse `1/t/T/TRUE/true/True` and `0/f/F/FALSE/false/False`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
