//! MIDI Keeper: hands-free MIDI recording service with an HTTP/WebSocket
//! surface.

mod config;
mod error;
mod routes;
#[cfg(test)]
mod tests;
mod ws;

pub(crate) use {
    error::{AppError, Result as AppResult},
    routes::AppState,
};

use crate::config::Config;

use std::sync::Arc;

use midi_keeper_core::{AlsaDriver, MidiSystem, RecordingStore, SystemOptions};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application entry point.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("midi_keeper=debug,midi_keeper_core=debug")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = Config::load()?;

    // Storage must come up before anything is served; a broken database is
    // a startup failure, not a per-request one.
    let store = Arc::new(RecordingStore::open(
        &config.storage.database_path,
        &config.storage.recordings_dir,
    )?);

    let temp_dir = config.recording.temp_dir();
    tokio::fs::create_dir_all(&temp_dir).await?;

    let system = MidiSystem::new(
        Arc::new(AlsaDriver),
        Arc::clone(&store),
        SystemOptions {
            inactivity_window: config.recording.inactivity_window(),
            temp_dir,
        },
    );

    let state = AppState {
        devices: Arc::clone(&system.devices),
        recorder: Arc::clone(&system.recorder),
        store,
        events: system.events.clone(),
    };
    let app = routes::router(state, config.server.static_dir.clone());

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr, "Server listening");

    let devices = Arc::clone(&system.devices);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            // Tears down the monitor and any in-flight capture process.
            devices.disconnect().await;
        })
        .await?;

    Ok(())
}
