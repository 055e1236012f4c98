//! Configuration for squidgate
//!
//! Centralized configuration with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, StoreError};

/// Main configuration for a squidgate store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Database file holding every record type.
    /// Parent directories are created on open.
    pub db_file: PathBuf,

    /// Page cache size handed to the engine (in bytes)
    pub cache_size: usize,

    // -------------------------------------------------------------------------
    // Commit Configuration
    // -------------------------------------------------------------------------
    /// How write transactions are made durable
    pub sync_strategy: SyncStrategy,
}

/// Commit durability strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// fsync on every commit (safest, slowest)
    EveryCommit,

    /// Let the engine batch fsyncs; a crash may drop the latest commits
    /// but never leaves a partial one
    Eventual,
}

impl SyncStrategy {
    pub(crate) fn durability(self) -> redb::Durability {
        match self {
            SyncStrategy::EveryCommit => redb::Durability::Immediate,
            SyncStrategy::Eventual => redb::Durability::Eventual,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_file: PathBuf::from("./squidgate.db"),
            cache_size: 64 * 1024 * 1024, // 64 MB
            sync_strategy: SyncStrategy::EveryCommit,
        }
    }
}

/// On-disk gateway configuration.
///
/// The gateway's JSON file also carries proxy listener, admin listener and
/// JWT settings; only the storage keys are read here.
#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(alias = "bolt_db_file")]
    db_file: Option<PathBuf>,
    cache_size: Option<usize>,
    sync_strategy: Option<SyncStrategy>,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load storage settings from the gateway's JSON configuration file.
    ///
    /// Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let file: FileConfig = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Config(format!("{}: {}", path.display(), e)))?;

        let mut builder = Config::builder();
        if let Some(db_file) = file.db_file {
            builder = builder.db_file(db_file);
        }
        if let Some(cache_size) = file.cache_size {
            builder = builder.cache_size(cache_size);
        }
        if let Some(strategy) = file.sync_strategy {
            builder = builder.sync_strategy(strategy);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.db_file.as_os_str().is_empty() {
            return Err(StoreError::Config("db_file must not be empty".to_string()));
        }
        if self.db_file.is_dir() {
            return Err(StoreError::Config(format!(
                "db_file {} is a directory",
                self.db_file.display()
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn db_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_file = path.into();
        self
    }

    /// Set the engine page cache size (in bytes)
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.config.cache_size = bytes;
        self
    }

    /// Set the commit durability strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
