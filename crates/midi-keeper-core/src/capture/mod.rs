//! Capture driver abstraction.
//!
//! The driver wraps the external MIDI capture facility: it enumerates
//! ports, runs an activity monitor bound to a port, and spawns raw capture
//! processes. It sits behind a trait so the session layers can be tested
//! against a fake driver.

mod alsa;

pub use alsa::AlsaDriver;
#[cfg(test)]
pub(crate) use alsa::parse_port_listing;

use crate::CoreResult;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An enumerated MIDI input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiPort {
    /// Sequencer port identifier, e.g. `"20:0"`.
    #[serde(rename = "portIdentifier")]
    pub port: String,
    /// Human-readable device name.
    #[serde(rename = "displayName")]
    pub name: String,
}

/// Raw signal relayed from an activity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSignal {
    /// MIDI data was observed on the monitored port.
    Activity,
    /// The monitor process exited on its own.
    Closed,
}

/// A running child process owned by the driver.
///
/// `stop` signals the process and waits for it to exit before returning,
/// so the caller knows the resource is released when the call completes.
#[async_trait]
pub trait DriverProcess: Send {
    /// Stop the process and confirm its exit.
    async fn stop(self: Box<Self>) -> CoreResult<()>;
}

/// A live activity monitor bound to one port.
pub struct ActivityMonitor {
    /// Stream of raw signals; closes when the monitor stops.
    pub signals: mpsc::Receiver<MonitorSignal>,
    /// Handle owning the monitor process.
    pub process: Box<dyn DriverProcess>,
}

/// External MIDI capture facility.
#[async_trait]
pub trait CaptureDriver: Send + Sync {
    /// Enumerate available input ports, in the facility's order.
    async fn list_ports(&self) -> CoreResult<Vec<MidiPort>>;

    /// Start an activity monitor for the given port.
    async fn start_monitor(&self, port: &str) -> CoreResult<ActivityMonitor>;

    /// Start a raw capture process writing to `destination`.
    async fn start_capture(&self, port: &str, destination: &Path)
    -> CoreResult<Box<dyn DriverProcess>>;
}
