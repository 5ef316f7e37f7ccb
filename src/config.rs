//! Configuration for ArgonBase
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Directory (under `data_dir`) holding the two catalog tables
pub const CATALOG_DIR: &str = "catalog";

/// Directory (under `data_dir`) holding user table and index files
pub const USER_DATA_DIR: &str = "userData";

/// Main configuration for an ArgonBase instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── catalog/     (argonbase_tables.tbl, argonbase_columns.tbl)
    ///     └── userData/    (<table>.tbl, <table>.<column>.ndx)
    pub data_dir: PathBuf,

    /// Call `sync_data` after every page write
    pub sync_on_write: bool,

    // -------------------------------------------------------------------------
    // Shell Configuration
    // -------------------------------------------------------------------------
    /// Prompt printed by the interactive shell
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sync_on_write: false,
            prompt: "argonsql> ".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Directory holding the catalog tables
    pub fn catalog_dir(&self) -> PathBuf {
        self.data_dir.join(CATALOG_DIR)
    }

    /// Directory holding user tables and their indexes
    pub fn user_data_dir(&self) -> PathBuf {
        self.data_dir.join(USER_DATA_DIR)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Enable or disable syncing after every page write
    pub fn sync_on_write(mut self, sync: bool) -> Self {
        self.config.sync_on_write = sync;
        self
    }

    /// Set the shell prompt
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = prompt.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
