// Storage module
// Durable boolean flags, present = true, absent = false

use crate::config::Config;
use anyhow::{Context, Result};
use directories_next::BaseDirs;
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Key of the "user has seen the notice" flag
pub const SHOWN_ADVERT_KEY: &str = "shownAdvert";

/// A store of write-once boolean flags
pub trait NoticeStore {
    /// Whether the flag has ever been set
    fn load(&self, key: &str) -> Result<bool>;

    /// Set the flag; it is never cleared
    fn store(&mut self, key: &str) -> Result<()>;
}

/// Default directory for persisted flags
pub fn default_storage_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.config_dir().join("flagframe"))
}

/// Keeps one marker file per flag inside a directory
#[derive(Debug, Clone)]
pub struct FileNoticeStore {
    dir: PathBuf,
}

impl FileNoticeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at [`default_storage_dir`]
    pub fn in_default_dir() -> Result<Self> {
        let dir = default_storage_dir().context("Could not determine config directory")?;
        Ok(Self::new(dir))
    }

    /// Store rooted at the configured directory, or the default one
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.storage_dir {
            Some(dir) => Ok(Self::new(dir.clone())),
            None => Self::in_default_dir(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl NoticeStore for FileNoticeStore {
    fn load(&self, key: &str) -> Result<bool> {
        let path = self.marker_path(key);
        path.try_exists()
            .with_context(|| format!("Failed to check flag file: {}", path.display()))
    }

    fn store(&mut self, key: &str) -> Result<()> {
        let path = self.marker_path(key);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create storage dir: {}", self.dir.display()))?;
        fs::write(&path, b"1")
            .with_context(|| format!("Failed to write flag file: {}", path.display()))?;
        debug!("Persisted flag {} at {}", key, path.display());
        Ok(())
    }
}

/// Flags kept in memory for the lifetime of the store
#[derive(Debug, Clone, Default)]
pub struct MemoryNoticeStore {
    keys: HashSet<String>,
}

impl MemoryNoticeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given flags already set
    pub fn with_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            keys: keys.into_iter().map(str::to_string).collect(),
        }
    }
}

impl NoticeStore for MemoryNoticeStore {
    fn load(&self, key: &str) -> Result<bool> {
        Ok(self.keys.contains(key))
    }

    fn store(&mut self, key: &str) -> Result<()> {
        self.keys.insert(key.to_string());
        Ok(())
    }
}
