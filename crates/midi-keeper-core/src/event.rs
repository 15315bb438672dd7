//! Event fan-out to connected observers.
//!
//! A single [`EventBus`] is shared by every component that emits lifecycle
//! events. Observers subscribe independently; dropping a receiver releases
//! its subscription without affecting the others. Delivery is
//! fire-and-forget: a lagged observer skips missed events rather than
//! blocking publishers.

use crate::store::Recording;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per observer before a slow receiver starts lagging.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Why a live recording session was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    /// Explicit user-initiated stop.
    Manual,
    /// The hook was released while a session was live.
    Unhook,
    /// The inactivity window elapsed with no activity signal.
    Inactivity,
}

/// Point-in-time view of device and recording state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Whether a device binding is currently installed.
    pub is_device_connected: bool,
    /// Display name of the bound device, if any.
    pub connected_device: Option<String>,
    /// Whether a recording session is live.
    pub is_recording: bool,
    /// Whether the system is armed to auto-start on activity.
    pub is_hooked_for_recording: bool,
    /// Elapsed seconds of the live session, zero when idle.
    pub recording_duration_secs: u64,
    /// When the last raw activity signal was observed.
    pub last_activity_at: Option<DateTime<Utc>>,
    /// The most recently persisted recording.
    pub last_recording: Option<Recording>,
}

/// Payload of a `recordingError` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    /// Machine-readable error category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Payload of a `recordingStopped` event.
#[derive(Debug, Clone, Serialize)]
pub struct StoppedNotice {
    /// Why the session ended.
    pub reason: StopReason,
    /// The persisted recording produced by the session.
    pub recording: Recording,
}

/// Payload of a `hookStatusChanged` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookNotice {
    /// The new hook state.
    pub is_hooked: bool,
}

/// A lifecycle event pushed to every connected observer.
///
/// Serializes to the wire format of the event channel: an object tagged
/// by `type` with a camelCase payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Full state snapshot.
    #[serde(rename = "status")]
    Status {
        /// The snapshot.
        data: StatusSnapshot,
    },
    /// One raw activity pulse was observed on the bound port.
    #[serde(rename = "midiActivity")]
    MidiActivity {
        /// Milliseconds since the Unix epoch.
        timestamp: i64,
    },
    /// A device-level operation failed.
    #[serde(rename = "deviceError")]
    DeviceError {
        /// Human-readable description.
        error: String,
    },
    /// A recording-level operation failed.
    #[serde(rename = "recordingError")]
    RecordingError {
        /// Categorized failure description.
        error: ErrorNotice,
    },
    /// A live session ended and was persisted.
    #[serde(rename = "recordingStopped")]
    RecordingStopped {
        /// Stop reason and the resulting recording.
        data: StoppedNotice,
    },
    /// The hook (arm) state changed.
    #[serde(rename = "hookStatusChanged")]
    HookStatusChanged {
        /// The new hook state.
        data: HookNotice,
    },
}

/// Shared publish/subscribe registry for [`Event`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus with the default per-observer buffer.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Open an independent subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Sending with no subscribers is not an error; the event is dropped.
    pub fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            trace!("event dropped, no observers connected");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
