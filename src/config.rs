//! Settings file handling. A missing file means defaults; a broken
//! file is reported, not silently ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GenerestError, GenerestResult};
use crate::ingest::{ApiUrl, DEFAULT_BASE_URL, DEFAULT_ENTITY, DEFAULT_PATH_END};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub path_end: String,
    pub metadata_url: String,
    pub default_entity: String,
    pub default_variable: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path_end: DEFAULT_PATH_END.to_string(),
            metadata_url: DEFAULT_BASE_URL.to_string(),
            default_entity: DEFAULT_ENTITY.to_string(),
            default_variable: String::new(),
        }
    }
}

impl ApiSettings {
    pub fn source_url(&self) -> ApiUrl {
        ApiUrl {
            base_url: self.base_url.clone(),
            path_end: self.path_end.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub bpm: f32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self { bpm: 90.0 }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("generest").join("generest.toml"))
    }

    /// Load settings from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> GenerestResult<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> GenerestResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| GenerestError::config(path, e.to_string()))?;
        toml::from_str(&content).map_err(|e| GenerestError::config(path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.api.default_entity, DEFAULT_ENTITY);
        assert!(settings.api.default_variable.is_empty());
        assert_eq!(settings.transport.bpm, 90.0);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\nbpm = 120.0").unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.transport.bpm, 120.0);
        assert_eq!(settings.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_broken_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "transport = 'nope").unwrap();

        let result = Settings::load_from(file.path());
        assert!(matches!(result, Err(GenerestError::Config { .. })));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = Settings::load_from(Path::new("/nonexistent/generest.toml"));
        assert!(matches!(result, Err(GenerestError::Config { .. })));
    }
}
