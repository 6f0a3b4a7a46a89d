//! API credential storage.
//!
//! The flight-status API needs a single access key. It is persisted as a
//! plain file in the data directory and can be overridden per-invocation
//! by the `SKYTRACK_API_KEY` environment variable or the `api.key`
//! configuration field. Absence is a recoverable [`Error::CredentialMissing`],
//! surfaced once to the user together with the command that fixes it.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};

/// Environment variable consulted before the stored credential.
pub const API_KEY_ENV: &str = "SKYTRACK_API_KEY";

/// File name of the stored credential inside the data directory.
const KEY_FILE_NAME: &str = "api_key";

/// File-backed store for the flight-status API key.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the default location in the data directory.
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(Config::default_data_dir().join(KEY_FILE_NAME))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored key, if any.
    ///
    /// A missing file means no key; an empty or whitespace-only file is
    /// treated the same way.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let key = contents.trim();
                if key.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(key.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a key, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` for an empty key, or an I/O error if
    /// the file cannot be written.
    pub fn store(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation("API key must not be empty"));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        std::fs::write(&self.path, key)?;
        info!("API key stored at {}", self.path.display());
        Ok(())
    }

    /// Delete the stored key. Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("API key removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the effective API key.
    ///
    /// Precedence: `SKYTRACK_API_KEY` environment variable, then the
    /// `api.key` configuration field, then the stored credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored credential cannot be read.
    pub fn resolve(&self, config: &Config) -> Result<Option<String>> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                debug!("using API key from {API_KEY_ENV}");
                return Ok(Some(key.to_string()));
            }
        }

        if let Some(key) = config.api.key.as_deref() {
            let key = key.trim();
            if !key.is_empty() {
                debug!("using API key from configuration");
                return Ok(Some(key.to_string()));
            }
        }

        self.load()
    }
}
