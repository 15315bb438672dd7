use std::{panic::Location, result::Result as StdResult};

use error_location::ErrorLocation;
use thiserror::Error;
use uuid::Uuid;

/// MIDI capture and persistence errors with source location tracking.
#[derive(Error, Debug)]
pub enum MidiError {
    /// The MIDI device or its monitor process could not be opened.
    #[error("MIDI device unavailable: {reason} {location}")]
    DeviceUnavailable {
        /// Description of the underlying failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Port enumeration via the external facility failed.
    #[error("Device enumeration failed: {reason} {location}")]
    EnumerationFailed {
        /// Description of the underlying failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An operation required a connected device and none is bound.
    #[error("No MIDI device connected {location}")]
    NoDeviceConnected {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A recording (or the armed hook) is already active.
    #[error("Recording already active {location}")]
    AlreadyActive {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Stop was requested with no live recording session.
    #[error("No active recording {location}")]
    NoActiveRecording {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Moving the artifact or writing its metadata row failed.
    #[error("Failed to persist recording: {reason} {location}")]
    PersistenceFailed {
        /// Description of the underlying failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// No persisted recording exists with the given identity.
    #[error("No recording with id {id} {location}")]
    NotFound {
        /// The unknown recording id.
        id: Uuid,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from process or filesystem operations.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl From<std::io::Error> for MidiError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        MidiError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

// Manual From with location tracking; #[from] does not support extra fields.
// The metadata table is the only rusqlite surface, so storage errors fold
// into the persistence taxonomy.
impl From<rusqlite::Error> for MidiError {
    #[track_caller]
    fn from(source: rusqlite::Error) -> Self {
        MidiError::PersistenceFailed {
            reason: source.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`MidiError`].
pub type Result<T> = StdResult<T, MidiError>;
