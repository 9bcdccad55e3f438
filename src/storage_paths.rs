//! Home-based storage paths for controller persistence.
//!
//! Everything durable lives under `~/.workshop/`. The `WORKSHOP_HOME`
//! environment variable overrides the root, which tests use to point the
//! store at a temp directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// The name of the workshop storage directory under the user's home.
const WORKSHOP_DIR: &str = ".workshop";

/// Returns the storage root, creating it if needed.
///
/// Honors `WORKSHOP_HOME` when set; otherwise `~/.workshop/`.
pub fn workshop_home_dir() -> Result<PathBuf> {
    let root = match std::env::var_os("WORKSHOP_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .context("Could not determine home directory for workshop storage")?
            .join(WORKSHOP_DIR),
    };
    fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create workshop directory: {}", root.display()))?;
    Ok(root)
}

/// Returns the secure-record directory: `<home>/records/`.
///
/// Creates the directory if it doesn't exist.
pub fn records_dir() -> Result<PathBuf> {
    let dir = workshop_home_dir()?.join("records");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create records directory: {}", dir.display()))?;
    Ok(dir)
}
