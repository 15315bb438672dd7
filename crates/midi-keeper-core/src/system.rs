//! Wiring for the device session, recorder, and event bus.

use crate::{
    capture::CaptureDriver,
    device::DeviceSession,
    event::EventBus,
    recorder::Recorder,
    store::RecordingStore,
};

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::sync::watch;

/// Tunables for a [`MidiSystem`].
#[derive(Debug, Clone)]
pub struct SystemOptions {
    /// How long a live session may sit without activity before it stops.
    pub inactivity_window: Duration,
    /// Directory for in-flight capture artifacts.
    pub temp_dir: PathBuf,
}

/// The assembled recording system.
///
/// Construction wires the device session and recorder together through a
/// watch channel carrying the current binding, and hands both the shared
/// event bus.
pub struct MidiSystem {
    /// Device binding owner.
    pub devices: Arc<DeviceSession>,
    /// Recording state machine.
    pub recorder: Arc<Recorder>,
    /// Lifecycle event fan-out.
    pub events: EventBus,
}

impl MidiSystem {
    /// Assemble a system on top of a capture driver and a store.
    pub fn new(
        driver: Arc<dyn CaptureDriver>,
        store: Arc<RecordingStore>,
        options: SystemOptions,
    ) -> Self {
        let events = EventBus::new();
        let (binding_tx, binding_rx) = watch::channel(None);

        let recorder = Arc::new(Recorder::new(
            Arc::clone(&driver),
            store,
            events.clone(),
            binding_rx,
            options.inactivity_window,
            options.temp_dir,
        ));

        let devices = Arc::new(DeviceSession::new(
            driver,
            Arc::clone(&recorder),
            events.clone(),
            binding_tx,
        ));

        Self {
            devices,
            recorder,
            events,
        }
    }
}
