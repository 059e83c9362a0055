//! Configuration files for Almanac
//!
//! Every Almanac component keeps its settings as a small JSON document in a
//! shared directory (`~/.config/almanac/`). Missing files are not an error for
//! callers that have sensible defaults; see [`load_json_or_default`].
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory under the platform config dir
const APP_DIR: &str = "almanac";

/// Initialize the Almanac config directory.
///
/// Creates ~/.config/almanac/ if it doesn't exist.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the Almanac config directory (~/.config/almanac/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the Almanac config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Check if a config file exists in the Almanac config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Load and parse a JSON config file from the Almanac config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load a JSON config file, or `T::default()` when the file does not exist.
///
/// A file that exists but fails to parse is still an error: silently
/// replacing a broken config with defaults hides typos.
pub fn load_json_or_default<T: DeserializeOwned + Default>(filename: &str) -> Result<T> {
    match config_path(filename) {
        Some(path) => load_json_file_or_default(&path),
        None => Ok(T::default()),
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Like [`load_json_file`], but a missing file yields `T::default()`
pub fn load_json_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    load_json_file(path)
}

/// Ensure the Almanac config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Save a value as JSON to a config file in the Almanac config directory
pub fn save_json<T: Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    save_json_file(&dir.join(filename), value)
}

/// Save a value as pretty-printed JSON to an arbitrary path
pub fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(default)]
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("almanac"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path("timeline.json").unwrap();
        assert!(path.ends_with("almanac/timeline.json"));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        let value = Sample {
            name: "week".to_string(),
            count: 7,
        };

        save_json_file(&path, &value).unwrap();
        let loaded: Sample = load_json_file(&path).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let loaded: Sample = load_json_file_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: Result<Sample> = load_json_file_or_default(&path);
        assert!(result.is_err());
    }
}
