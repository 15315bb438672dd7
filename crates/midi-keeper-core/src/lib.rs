//! MIDI Keeper Core Library
//!
//! Device session handling, inactivity-driven recording, and SQLite-backed
//! persistence for MIDI captures.
//!
//! # Example
//!
//! ```no_run
//! use midi_keeper_core::{
//!     AlsaDriver, CoreResult, MidiSystem, RecordingStore, SystemOptions,
//! };
//!
//! use std::{path::Path, sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> CoreResult<()> {
//!     let store = Arc::new(RecordingStore::open(
//!         Path::new("recordings.db"),
//!         Path::new("recordings"),
//!     )?);
//!
//!     let system = MidiSystem::new(
//!         Arc::new(AlsaDriver),
//!         store,
//!         SystemOptions {
//!             inactivity_window: Duration::from_secs(3),
//!             temp_dir: std::env::temp_dir(),
//!         },
//!     );
//!
//!     system.devices.connect("20:0", "KeyLab Essential 61").await?;
//!     system.recorder.hook().await?;
//!     Ok(())
//! }
//! ```

mod capture;
mod device;
mod error;
mod event;
mod recorder;
mod store;
mod system;

pub use {
    capture::{ActivityMonitor, AlsaDriver, CaptureDriver, DriverProcess, MidiPort, MonitorSignal},
    device::{DeviceBinding, DeviceSession},
    error::{MidiError, Result as CoreResult},
    event::{ErrorNotice, Event, EventBus, HookNotice, StatusSnapshot, StopReason, StoppedNotice},
    recorder::Recorder,
    store::{Recording, RecordingStore},
    system::{MidiSystem, SystemOptions},
};

#[cfg(test)]
mod tests;
