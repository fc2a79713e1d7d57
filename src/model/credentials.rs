//! Durable storage for the token pair so a session survives restarts

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::types::TokenPair;

pub const DEFAULT_CREDENTIALS_FILE: &str = ".cache/credentials.json";

pub trait CredentialStore: Send + Sync {
    /// Returns `None` on first run or when nothing usable is stored.
    fn load(&self) -> Option<TokenPair>;
    fn save(&self, pair: &TokenPair) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the pair as a JSON document keyed by `access_token` and
/// `refresh_token`.
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<TokenPair> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read stored credentials");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(pair) => Some(pair),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt credentials file");
                None
            }
        }
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let content = serde_json::to_string_pretty(pair)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "Saved credentials to disk");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

/// Process-local store, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<TokenPair> {
        self.pair.lock().ok().and_then(|guard| guard.clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        let mut guard = self
            .pair
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store poisoned"))?;
        *guard = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .pair
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store poisoned"))?;
        *guard = None;
        Ok(())
    }
}
