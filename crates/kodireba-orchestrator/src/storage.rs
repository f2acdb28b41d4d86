//! Browser-style local storage backed by a JSON file.
//!
//! The lesson page persists a handful of string keys (currently only
//! [`LAST_LESSON_URL_KEY`]). [`LocalStorage`] keeps them in memory and writes
//! the whole map back to disk on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{KodiError, Result};

/// Key under which the URL of the last opened lesson is stored.
pub const LAST_LESSON_URL_KEY: &str = "lastLessonUrl";

/// String key/value store.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl LocalStorage {
    /// Opens the store at `path`.
    ///
    /// A missing file yields an empty store; the file is created on the first
    /// write.
    ///
    /// # Errors
    ///
    /// Returns `StorageCorrupted` if the file is not a JSON object of
    /// strings, or an IO error if it cannot be read.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| KodiError::storage_corrupted(&path, e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Storage file missing, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), keys = entries.len(), "Opened local storage");
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// Creates a store that never touches the disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Returns the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Stores `value` under `key` and persists the store.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub async fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        if self.entries.get(&key) == Some(&value) {
            return Ok(());
        }
        self.entries.insert(key, value);
        self.flush().await
    }

    /// Removes `key` and persists the store.
    ///
    /// Returns the removed value.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub async fn remove(&mut self, key: &str) -> Result<Option<String>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.flush().await?;
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(path, json).await?;
        debug!(path = %path.display(), "Local storage flushed");
        Ok(())
    }
}
