//! Path resolution for converge
//!
//! # Environment Variables
//!
//! - `CONVERGE_FILE` - Declaration file used when none is given on the command line
//!
//! # Declaration File Priority
//!
//! 1. The `FILE` argument
//! 2. `CONVERGE_FILE` environment variable
//! 3. `XDG_CONFIG_HOME/converge/resources.toml` (if set)
//! 4. `~/.config/converge/resources.toml`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for the declaration file
pub const ENV_DECLARATION_FILE: &str = "CONVERGE_FILE";

/// File name looked up in the config directory
pub const DEFAULT_FILE_NAME: &str = "resources.toml";

/// Get the converge config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("converge");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("converge"))
}

/// Resolve the declaration file to read
pub fn declaration_file(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand(path));
    }

    if let Ok(path) = std::env::var(ENV_DECLARATION_FILE) {
        let path = expand(&path);
        log::debug!(
            "Using declaration file from {}: {}",
            ENV_DECLARATION_FILE,
            path.display()
        );
        return Ok(path);
    }

    let path = config_dir()?.join(DEFAULT_FILE_NAME);
    log::debug!("Using default declaration file: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path
///
/// Unknown variables leave the path as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
