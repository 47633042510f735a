//! Platform-specific configuration paths.
//!
//! - Linux: `~/.config/cricket/`
//! - macOS: `~/Library/Application Support/cricket/`
//! - Windows: `%APPDATA%\cricket\`

use std::path::{Path, PathBuf};

use crate::engine_config::EngineConfig;
use crate::error::{ConfigError, Result};

/// Application name used for directory paths.
const APP_NAME: &str = "cricket";

/// File name of the engine configuration.
const CONFIG_FILE: &str = "engine.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the default engine configuration file path.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Ensures the user config directory exists, creating it if needed.
pub fn ensure_user_config_dir() -> Result<PathBuf> {
    let dir = user_config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    Ok(dir)
}

/// Loads the configuration at `path`, or the default location when `path`
/// is `None`, then validates it.
///
/// A missing file at the default location yields the default configuration;
/// a missing explicit path is an error.
pub fn load_or_default(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => {
            let path = default_config_path();
            if path.exists() {
                EngineConfig::load(&path)?
            } else {
                tracing::debug!(path = %path.display(), "no engine config; using defaults");
                EngineConfig::default()
            }
        }
    };
    Ok(config.validated())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_ends_with_app_and_file() {
        let path = default_config_path();
        assert!(path.ends_with("cricket/engine.toml"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_or_default(Some(&missing)),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
