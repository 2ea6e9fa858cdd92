use anyhow::{Context, Result};
use std::path::PathBuf;

/// Locate the user's downloads directory.
pub fn default_downloads_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
}

/// Resolve the directory to watch, preferring an explicit argument.
pub fn resolve_downloads_dir(downloads_dir: Option<String>) -> Result<PathBuf> {
    if let Some(path) = downloads_dir {
        PathBuf::from(&path)
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize downloads directory: {}", path))
    } else {
        default_downloads_dir().context("Could not determine a downloads directory to watch")
    }
}
