use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use facecheck_core::shared::constants::{
    DEFAULT_JPEG_QUALITY, DEFAULT_POLL_INTERVAL, DEFAULT_REQUIRED_HITS, DEFAULT_RETRY_INTERVAL,
    DEFAULT_THRESHOLD_PERCENT,
};
use facecheck_core::verification::domain::verification_policy::VerificationPolicy;

const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("no per-user config directory on this platform")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub access_token: Option<String>,
    pub threshold_percent: f64,
    pub required_hits: u32,
    pub poll_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub jpeg_quality: u8,
    /// Preferred camera device id.
    pub camera: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            access_token: None,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            required_hits: DEFAULT_REQUIRED_HITS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL.as_millis() as u64,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            camera: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Facecheck").join("settings.json"))
    }

    /// Loads the user's settings, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            log::warn!("Ignoring settings: {e}");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn to_policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            threshold_percent: self.threshold_percent,
            required_hits: self.required_hits,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            preview_auto_capture: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_policy_defaults() {
        let policy = Settings::default().to_policy();
        assert_eq!(policy, VerificationPolicy::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            server_url: "https://attendance.example.com".into(),
            access_token: Some("tok".into()),
            threshold_percent: 82.5,
            camera: Some("usb".into()),
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"threshold_percent": 75.0}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_relative_eq!(settings.threshold_percent, 75.0);
        assert_eq!(settings.required_hits, DEFAULT_REQUIRED_HITS);
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::load_from(&dir.path().join("absent.json")),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    fn test_policy_uses_configured_intervals() {
        let settings = Settings {
            poll_interval_ms: 750,
            retry_interval_ms: 100,
            required_hits: 3,
            ..Settings::default()
        };
        let policy = settings.to_policy();
        assert_eq!(policy.poll_interval, Duration::from_millis(750));
        assert_eq!(policy.retry_interval, Duration::from_millis(100));
        assert_eq!(policy.required_hits, 3);
    }
}
