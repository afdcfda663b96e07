//! Store configuration.

use std::path::PathBuf;

/// Default snapshot location.
pub const DEFAULT_STORE_PATH: &str = "data/jobs.json";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Snapshot file path
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            path: std::env::var("AVM_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH)),
        }
    }
}
