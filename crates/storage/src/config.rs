#![forbid(unsafe_code)]

use crate::StoreError;
use sq_core::ids::CollectionName;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STORAGE_DIR: &str = ".sq";
pub const DEFAULT_DB_FILE: &str = "sequences.db";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_STORAGE_DIR: &str = "SQ_STORAGE_DIR";
pub const ENV_DB_FILE: &str = "SQ_DB_FILE";
pub const ENV_COLLECTION: &str = "SQ_COLLECTION";
pub const ENV_BUSY_TIMEOUT_MS: &str = "SQ_BUSY_TIMEOUT_MS";

/// Where and how a [`crate::SqliteStore`] connects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub storage_dir: PathBuf,
    pub db_file: String,
    pub collection: CollectionName,
    /// How long a writer waits for the database lock before failing with `Busy`.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_DIR)
    }
}

impl StoreConfig {
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            db_file: DEFAULT_DB_FILE.to_string(),
            collection: CollectionName::default(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_db_file(mut self, db_file: impl Into<String>) -> Self {
        self.db_file = db_file.into();
        self
    }

    pub fn with_collection(mut self, collection: CollectionName) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.db_file)
    }

    /// Defaults overridden by `SQ_*` environment variables. Blank values count as unset.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(env_var)
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StoreError> {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_DB_FILE) {
            config.db_file = file;
        }
        if let Some(collection) = lookup(ENV_COLLECTION) {
            config.collection = CollectionName::try_new(collection)
                .map_err(|_| StoreError::InvalidInput("invalid SQ_COLLECTION"))?;
        }
        if let Some(timeout) = lookup(ENV_BUSY_TIMEOUT_MS) {
            let ms = timeout.parse::<u64>().map_err(|_| {
                StoreError::InvalidInput("SQ_BUSY_TIMEOUT_MS must be an integer (milliseconds)")
            })?;
            config.busy_timeout = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.db_file.is_empty() {
            return Err(StoreError::InvalidInput("db_file must not be empty"));
        }
        if Path::new(&self.db_file).components().count() != 1 {
            return Err(StoreError::InvalidInput(
                "db_file must be a bare file name inside storage_dir",
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
