use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Recording storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding persisted recording artifacts.
    pub recordings_dir: PathBuf,
    /// SQLite database file for recording metadata.
    pub database_path: PathBuf,
}
