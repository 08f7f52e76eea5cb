//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod models;
pub mod output;
pub mod parse;
pub mod process;

use std::path::{Path, PathBuf};

use emid_core::models::config::EmidConfig;
use tracing::debug;

/// File extensions accepted by `process` and `batch`.
pub const SUPPORTED_EXTENSIONS: [&str; 8] =
    ["jpg", "jpeg", "png", "pdf", "tif", "tiff", "bmp", "webp"];

/// Platform config location, e.g. `~/.config/emid/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emid")
        .join("config.json")
}

/// The file commands read and write: `-c` if given, else the platform path.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load configuration. An explicit `-c` path must exist; the platform file is
/// optional and defaults apply without it.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<EmidConfig> {
    if let Some(path) = config_path {
        let path = Path::new(path);
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(EmidConfig::from_file(path)?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(EmidConfig::from_file(&path)?)
    } else {
        Ok(EmidConfig::default())
    }
}

/// Lowercased extension of `path`, if it is one we accept.
pub fn supported_extension(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    SUPPORTED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}
