//! Store configuration.

use std::path::{Path, PathBuf};

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "memories.db";

/// Legacy flat-file name inside the data directory.
pub const LEGACY_FILE_NAME: &str = "memories.json";

/// Suffix appended to the legacy file once it has been imported.
pub const LEGACY_BACKUP_SUFFIX: &str = ".backup";

/// Configuration for opening the memory store at its default location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the database file (relative paths resolve against the cwd).
    pub data_dir: PathBuf,
    /// Whether to import a legacy `memories.json` on open.
    pub migrate_legacy: bool,
    /// Default number of entries returned by timeline tools.
    pub timeline_limit: usize,
    /// Default number of entries returned by list tools.
    pub list_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("memories"),
            migrate_legacy: true,
            timeline_limit: 20,
            list_limit: 10,
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("HIAI_MEMORY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            migrate_legacy: std::env::var("HIAI_MEMORY_MIGRATE")
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(defaults.migrate_legacy),
            timeline_limit: std::env::var("HIAI_TIMELINE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeline_limit),
            list_limit: std::env::var("HIAI_LIST_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.list_limit),
        }
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Enable or disable legacy import.
    pub fn with_migration(mut self, enabled: bool) -> Self {
        self.migrate_legacy = enabled;
        self
    }

    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    /// Path of the legacy flat file.
    pub fn legacy_path(&self) -> PathBuf {
        self.data_dir.join(LEGACY_FILE_NAME)
    }
}
