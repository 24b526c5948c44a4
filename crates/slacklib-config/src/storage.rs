//! Local file storage for configuration
//!
//! Keeps the configuration as a flat JSON object on disk. Every write is
//! flushed and renamed into place before the call returns.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::ConfigError;
use crate::merger::{ConfigMap, ConfigValue};

/// Durable key/value table backed by a JSON file
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    entries: ConfigMap,
    created: bool,
}

impl LocalStore {
    /// Location of the store relative to the working directory
    pub const DEFAULT_PATH: &'static str = "database/config.json";

    /// Open the store at [`Self::DEFAULT_PATH`] under `dir`
    pub fn open_in(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::open(dir.as_ref().join(Self::DEFAULT_PATH))
    }

    /// Open the store, creating an empty `{}` file if none exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let created = !path.exists();

        if created {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_atomic(&path, &ConfigMap::new())?;
            info!(path = %path.display(), "Created local config store");
        }

        let content = fs::read_to_string(&path)?;
        let entries = if content.trim().is_empty() {
            ConfigMap::new()
        } else {
            serde_json::from_str(&content).map_err(|e| {
                ConfigError::parse(format!("Invalid config file {}: {e}", path.display()))
            })?
        };

        Ok(Self {
            path,
            entries,
            created,
        })
    }

    /// Get a single value; `None` means the key was never set
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Whole raw mapping
    pub fn all(&self) -> &ConfigMap {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the file did not exist before this store was opened
    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upsert one key and persist.
    ///
    /// The in-memory table only changes once the file is on disk.
    pub fn set(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value);
        self.commit(next)
    }

    /// Replace the whole table and persist
    pub fn replace_all(&mut self, entries: ConfigMap) -> Result<(), ConfigError> {
        self.commit(entries)
    }

    fn commit(&mut self, entries: ConfigMap) -> Result<(), ConfigError> {
        write_atomic(&self.path, &entries)?;
        debug!(path = %self.path.display(), keys = entries.len(), "Persisted local config");
        self.entries = entries;
        Ok(())
    }
}

fn write_atomic(path: &Path, entries: &ConfigMap) -> Result<(), ConfigError> {
    let json = serde_json::to_vec_pretty(entries)
        .map_err(|e| ConfigError::parse(format!("Failed to serialize config: {e}")))?;

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    sync_parent(path)?;
    Ok(())
}

/// Flush the directory entry written by the rename
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<(), ConfigError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
