use crate::config::default_port;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the HTTP and WebSocket server.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of static frontend assets to serve, if any.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}
