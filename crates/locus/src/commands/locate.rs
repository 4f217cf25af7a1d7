//! Locate and fetch commands.

use super::Settings;
use anyhow::Result;
use tracing::info;

/// Print a usable local path for `reference`.
pub fn run_locate(settings: &Settings, reference: &str, cache_dir: Option<&str>) -> Result<()> {
    let remote = settings.remote()?;
    let path = remote.locate(reference, cache_dir)?;
    println!("{}", path.display());
    Ok(())
}

/// Fetch `reference` into the cache and print the cached path.
///
/// Unlike [`run_locate`], a reference that is not remote is an error.
pub fn run_fetch(settings: &Settings, reference: &str, cache_dir: Option<&str>) -> Result<()> {
    let remote = settings.remote()?;
    let path = remote.fetch(reference, cache_dir)?;
    info!(path = %path.display(), "Fetched");
    println!("{}", path.display());
    Ok(())
}

/// Print the cache home.
pub fn run_home(settings: &Settings) -> Result<()> {
    let config = settings.load_config()?;
    println!("{}", config.resolve_home().display());
    Ok(())
}
