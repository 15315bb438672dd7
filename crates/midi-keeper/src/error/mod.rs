use midi_keeper_core::MidiError;

use std::{panic::Location, result::Result as StdResult};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use error_location::ErrorLocation;
use serde_json::json;
use thiserror::Error;

/// Application-level errors for the midi-keeper binary.
///
/// All variants include `ErrorLocation` for call-site tracking.
#[derive(Error, Debug)]
pub enum AppError {
    /// MIDI session or persistence error from midi-keeper-core.
    #[error("{source}")]
    Midi {
        /// The underlying session error.
        #[source]
        source: MidiError,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Configuration loading or saving error.
    #[error("Configuration error: {reason} {location}")]
    ConfigError {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// IO error from filesystem or network operations.
    #[error("IO error: {source} {location}")]
    IoError {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Location where this error was created.
        location: ErrorLocation,
    },
}

// Manual From<MidiError> with location tracking.
// Cannot use #[from] because it does not support extra fields.
impl From<MidiError> for AppError {
    #[track_caller]
    fn from(source: MidiError) -> Self {
        AppError::Midi {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for AppError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        AppError::IoError {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// HTTP status for a core error: state conflicts are 409, unknown ids 404,
/// external facility failures 502, the rest 500.
pub(crate) fn status_for(error: &MidiError) -> StatusCode {
    match error {
        MidiError::NoDeviceConnected { .. }
        | MidiError::AlreadyActive { .. }
        | MidiError::NoActiveRecording { .. } => StatusCode::CONFLICT,
        MidiError::NotFound { .. } => StatusCode::NOT_FOUND,
        MidiError::DeviceUnavailable { .. } | MidiError::EnumerationFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        MidiError::PersistenceFailed { .. } | MidiError::Io { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Midi { source, .. } => status_for(source),
            AppError::ConfigError { .. } | AppError::IoError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type alias using [`AppError`].
pub type Result<T> = StdResult<T, AppError>;
