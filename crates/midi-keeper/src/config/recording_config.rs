use crate::config::default_inactivity_timeout_ms;

use std::{env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Recording behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Silence window, in milliseconds, after which a live recording stops.
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
    /// Directory for in-flight capture artifacts; the system temp dir when
    /// unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl RecordingConfig {
    /// The inactivity window as a [`Duration`].
    pub fn inactivity_window(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    /// Resolved directory for in-flight artifacts.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }
}
