pub mod inspect;
pub mod locate;

pub use inspect::*;
pub use locate::*;

use anyhow::{Context, Result};
use locus_remote::{OsFs, Remote, RemoteConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Settings taken from global command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl Settings {
    /// Configuration from the config file (or defaults) and the environment,
    /// with `--home` applied on top.
    pub fn load_config(&self) -> Result<RemoteConfig> {
        let mut config = match &self.config {
            Some(path) => RemoteConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => RemoteConfig::from_env(),
        };
        if let Some(home) = &self.home {
            config.home = Some(home.clone());
        }
        Ok(config)
    }

    pub fn remote(&self) -> Result<Remote> {
        let config = self.load_config()?;
        Ok(Remote::new(&config, Arc::new(OsFs))?)
    }
}
