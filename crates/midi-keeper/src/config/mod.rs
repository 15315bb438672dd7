#[allow(clippy::module_inception)]
mod config;
mod recording_config;
mod server_config;
mod storage_config;

pub(crate) use {
    config::Config, recording_config::RecordingConfig, server_config::ServerConfig,
    storage_config::StorageConfig,
};

pub(crate) const DEFAULT_PORT: u16 = 6676;
pub(crate) const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 3000;

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_inactivity_timeout_ms() -> u64 {
    DEFAULT_INACTIVITY_TIMEOUT_MS
}
