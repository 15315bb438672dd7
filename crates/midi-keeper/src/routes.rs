//! HTTP surface for the recording service.

use crate::{AppError, AppResult, ws};

use std::{panic::Location, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use error_location::ErrorLocation;
use midi_keeper_core::{
    DeviceSession, ErrorNotice, Event, EventBus, MidiError, MidiPort, Recorder, Recording,
    RecordingStore, StatusSnapshot,
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::instrument;
use uuid::Uuid;

/// Shared handler state.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) devices: Arc<DeviceSession>,
    pub(crate) recorder: Arc<Recorder>,
    pub(crate) store: Arc<RecordingStore>,
    pub(crate) events: EventBus,
}

impl AppState {
    /// Broadcast a device-level command failure, then hand it back for the
    /// HTTP response. Passive observers see the same failure the caller does.
    fn device_failure(&self, error: MidiError) -> AppError {
        self.events.emit(Event::DeviceError {
            error: error.to_string(),
        });
        AppError::from(error)
    }

    /// Broadcast a recording-level command failure, then hand it back for
    /// the HTTP response.
    fn recording_failure(&self, error: MidiError) -> AppError {
        self.events.emit(Event::RecordingError {
            error: ErrorNotice {
                kind: "commandFailed".to_string(),
                message: error.to_string(),
            },
        });
        AppError::from(error)
    }
}

/// Build the service router.
pub(crate) fn router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/connect", post(connect_device))
        .route("/devices/disconnect", post(disconnect_device))
        .route("/recordings", get(list_recordings))
        .route("/recordings/{id}/download", get(download_recording))
        .route("/recordings/hook", post(hook))
        .route("/recordings/unhook", post(unhook))
        .route("/recordings/start", post(start_recording))
        .route("/recordings/stop", post(stop_recording))
        .route("/status", get(status))
        .route("/events", get(ws::events_ws))
        .layer(CorsLayer::permissive())
        .with_state(state);

    if let Some(static_dir) = static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
}

#[instrument(skip(state))]
async fn list_devices(State(state): State<AppState>) -> AppResult<Json<Vec<MidiPort>>> {
    let ports = state
        .devices
        .list_available()
        .await
        .map_err(|e| state.device_failure(e))?;
    Ok(Json(ports))
}

#[derive(Debug, Deserialize)]
struct ConnectRequest {
    #[serde(rename = "portIdentifier")]
    port: String,
    #[serde(rename = "displayName")]
    name: String,
}

#[instrument(skip(state))]
async fn connect_device(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .devices
        .connect(&request.port, &request.name)
        .await
        .map_err(|e| state.device_failure(e))?;
    Ok(Json(json!({ "success": true })))
}

#[instrument(skip(state))]
async fn disconnect_device(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.devices.disconnect().await;
    Json(json!({ "success": true }))
}

#[instrument(skip(state))]
async fn list_recordings(State(state): State<AppState>) -> AppResult<Json<Vec<Recording>>> {
    let recordings = state.store.list()?;
    Ok(Json(recordings))
}

#[instrument(skip(state))]
async fn download_recording(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let path = state.store.resolve_path(id)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.mid", id));

    // A row whose artifact vanished from disk is still a missing recording
    // from the caller's point of view.
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::from(MidiError::NotFound {
                id,
                location: ErrorLocation::from(Location::caller()),
            })
        } else {
            AppError::from(e)
        }
    })?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, "audio/midi".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

#[instrument(skip(state))]
async fn hook(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    state
        .recorder
        .hook()
        .await
        .map_err(|e| state.recording_failure(e))?;
    Ok(Json(json!({ "success": true })))
}

#[instrument(skip(state))]
async fn unhook(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    state
        .recorder
        .unhook()
        .await
        .map_err(|e| state.recording_failure(e))?;
    Ok(Json(json!({ "success": true })))
}

#[instrument(skip(state))]
async fn start_recording(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    state
        .recorder
        .start_recording()
        .await
        .map_err(|e| state.recording_failure(e))?;
    Ok(Json(json!({ "success": true })))
}

#[instrument(skip(state))]
async fn stop_recording(State(state): State<AppState>) -> AppResult<Json<Recording>> {
    let recording = state
        .recorder
        .stop_recording()
        .await
        .map_err(|e| state.recording_failure(e))?;
    Ok(Json(recording))
}

#[instrument(skip(state))]
async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.recorder.status().await)
}
