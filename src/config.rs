use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::MAX_CAPTURE_WINDOW;
use crate::auth::DEFAULT_BACKEND_URL;
use crate::logging::DEFAULT_LOG_DIR;
use crate::model::{DEFAULT_CREDENTIALS_FILE, DEFAULT_MEDIA_API_URL};
use crate::recognition::DEFAULT_RECOGNITION_URL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub media_api_url: String,
    pub recognition_url: String,
    pub recognition_api_token: String,
    pub recognition_timeout_ms: u64,
    pub capture_window_secs: u64,
    pub request_timeout_secs: u64,
    pub credentials_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            media_api_url: DEFAULT_MEDIA_API_URL.to_string(),
            recognition_url: DEFAULT_RECOGNITION_URL.to_string(),
            recognition_api_token: String::new(),
            recognition_timeout_ms: 15_000,
            capture_window_secs: MAX_CAPTURE_WINDOW.as_secs(),
            request_timeout_secs: 10,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("spotify-remote").join("config.toml"))
    }

    /// Load from `path`, or the default location, then apply environment
    /// overrides. A missing default file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path().filter(|p| p.exists()) {
                Some(default_path) => Self::from_file(&default_path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = var("SPOTIFY_REMOTE_BACKEND_URL") {
            self.backend_url = v;
        }
        if let Some(v) = var("SPOTIFY_REMOTE_MEDIA_API_URL") {
            self.media_api_url = v;
        }
        if let Some(v) = var("SPOTIFY_REMOTE_RECOGNITION_URL") {
            self.recognition_url = v;
        }
        if let Some(v) = var("AUDD_API_TOKEN") {
            self.recognition_api_token = v;
        }
        if let Some(v) = var("SPOTIFY_REMOTE_CREDENTIALS") {
            self.credentials_path = PathBuf::from(v);
        }
        if let Some(v) = var("SPOTIFY_REMOTE_LOG_DIR") {
            self.log_dir = PathBuf::from(v);
        }
    }

    /// Capture window, never longer than the hard cap.
    pub fn capture_window(&self) -> Duration {
        Duration::from_secs(self.capture_window_secs).min(MAX_CAPTURE_WINDOW)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend_url = \"http://localhost:9000\"\ncapture_window_secs = 5\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.backend_url, "http://localhost:9000");
        assert_eq!(config.capture_window(), Duration::from_secs(5));
        assert_eq!(config.media_api_url, DEFAULT_MEDIA_API_URL);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(dir.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AUDD_API_TOKEN", "secret"),
            ("SPOTIFY_REMOTE_BACKEND_URL", "http://env:1"),
            ("SPOTIFY_REMOTE_LOG_DIR", ""),
        ]);
        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.recognition_api_token, "secret");
        assert_eq!(config.backend_url, "http://env:1");
        // Empty values are ignored.
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
    }

    #[test]
    fn capture_window_is_capped() {
        let config = Config {
            capture_window_secs: 60,
            ..Config::default()
        };
        assert_eq!(config.capture_window(), MAX_CAPTURE_WINDOW);
    }
}
