//! Recording persistence gateway.
//!
//! Metadata lives in one SQLite table; each recording's artifact is a
//! standard MIDI file in the recordings directory under a time-derived
//! unique name. The artifact is moved into place before the metadata row
//! is written, so a row never references a file that does not exist.

use crate::{CoreResult, MidiError};

use std::{
    fs,
    panic::Location,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use error_location::ErrorLocation;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A persisted, addressable recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    /// Unique identity, assigned at persistence time.
    pub id: Uuid,
    /// Durable file name inside the recordings directory.
    pub filename: String,
    /// File name of the transient artifact the recording came from.
    pub original_filename: String,
    /// Name of the device the capture was bound to.
    pub device_name: String,
    /// Capture duration in seconds; back-filled after the row is created.
    pub duration_secs: Option<f64>,
    /// When the recording was persisted.
    pub created_at: DateTime<Utc>,
    /// Size of the durable artifact in bytes.
    pub file_size_bytes: u64,
    /// Number of MIDI events, when known.
    pub midi_event_count: Option<i64>,
}

/// SQLite-backed store for [`Recording`] rows and their artifacts.
///
/// The connection is wrapped in a `parking_lot::Mutex`: rusqlite's
/// `Connection` is not `Sync`, and parking_lot avoids poisoning the store
/// if a caller panics mid-operation.
pub struct RecordingStore {
    conn: Mutex<Connection>,
    recordings_dir: PathBuf,
}

impl RecordingStore {
    /// Open (or create) the database and the recordings directory.
    #[track_caller]
    #[instrument]
    pub fn open(database_path: &Path, recordings_dir: &Path) -> CoreResult<Self> {
        fs::create_dir_all(recordings_dir)?;
        if let Some(parent) = database_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(database_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            recordings_dir: recordings_dir.to_path_buf(),
        };
        store.init_schema()?;

        info!(
            database = %database_path.display(),
            recordings_dir = %recordings_dir.display(),
            "recording store opened"
        );

        Ok(store)
    }

    /// Open an in-memory database backed by a real recordings directory.
    #[track_caller]
    pub fn open_in_memory(recordings_dir: &Path) -> CoreResult<Self> {
        fs::create_dir_all(recordings_dir)?;
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            recordings_dir: recordings_dir.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> CoreResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                device_name TEXT NOT NULL,
                duration REAL,
                created_at TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                midi_event_count INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_recordings_created_at
                ON recordings(created_at DESC);
            "#,
        )?;
        Ok(())
    }

    /// Move a finished capture artifact into durable storage and record it.
    ///
    /// The artifact is in its final location before this returns `Ok`. If
    /// the metadata write fails after the move, the file is left on disk
    /// (orphaned but not silently lost) and the error propagates.
    #[instrument(skip(self))]
    pub fn persist(&self, artifact: &Path, device_name: &str) -> CoreResult<Recording> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let filename = derive_filename(created_at);
        let final_path = self.recordings_dir.join(&filename);

        move_artifact(artifact, &final_path)?;

        let file_size_bytes = fs::metadata(&final_path)
            .map_err(|e| MidiError::PersistenceFailed {
                reason: format!("failed to stat persisted artifact: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?
            .len();

        let original_filename = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.clone());

        let inserted = {
            let conn = self.conn.lock();
            conn.execute(
                r#"
                INSERT INTO recordings (
                    id, filename, original_filename, device_name,
                    created_at, file_size
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    id.to_string(),
                    filename,
                    original_filename,
                    device_name,
                    created_at.to_rfc3339(),
                    file_size_bytes as i64,
                ],
            )
        };

        if let Err(source) = inserted {
            warn!(
                path = %final_path.display(),
                error = %source,
                "metadata write failed, artifact left on disk"
            );
            return Err(MidiError::from(source));
        }

        info!(%id, filename = %filename, device = device_name, "recording persisted");

        Ok(Recording {
            id,
            filename,
            original_filename,
            device_name: device_name.to_string(),
            duration_secs: None,
            created_at,
            file_size_bytes,
            midi_event_count: None,
        })
    }

    /// All recordings, newest first.
    pub fn list(&self) -> CoreResult<Vec<Recording>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, filename, original_filename, device_name,
                   duration, created_at, file_size, midi_event_count
            FROM recordings
            ORDER BY created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([], row_to_recording)?;
        let mut recordings = Vec::new();
        for row in rows {
            recordings.push(row?);
        }

        Ok(recordings)
    }

    /// Durable location of a recording's artifact.
    #[track_caller]
    pub fn resolve_path(&self, id: Uuid) -> CoreResult<PathBuf> {
        let filename: Option<String> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT filename FROM recordings WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?
        };

        match filename {
            Some(filename) => Ok(self.recordings_dir.join(filename)),
            None => Err(MidiError::NotFound {
                id,
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Back-fill the duration of an already-persisted recording.
    ///
    /// Duration is only known once capture stops, while the row is created
    /// at stop time; this is the second half of that two-phase write.
    #[track_caller]
    pub fn backfill_duration(&self, id: Uuid, duration_secs: f64) -> CoreResult<()> {
        let updated = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE recordings SET duration = ?1 WHERE id = ?2",
                params![duration_secs, id.to_string()],
            )?
        };

        if updated == 0 {
            return Err(MidiError::NotFound {
                id,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        debug!(%id, duration_secs, "recording duration back-filled");
        Ok(())
    }
}

/// Time-derived unique artifact name, filesystem-safe.
fn derive_filename(created_at: DateTime<Utc>) -> String {
    format!("{}.mid", created_at.format("%Y-%m-%dT%H-%M-%S%.3f"))
}

/// Move the artifact into the recordings directory.
///
/// rename() is O(1) on the same filesystem; the temp dir is commonly a
/// different mount, so EXDEV falls back to copy + delete.
fn move_artifact(from: &Path, to: &Path) -> CoreResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            fs::copy(from, to).map_err(|e| MidiError::PersistenceFailed {
                reason: format!("failed to copy artifact into recordings dir: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;
            if let Err(e) = fs::remove_file(from) {
                warn!(path = %from.display(), error = %e, "failed to remove transient artifact");
            }
            Ok(())
        }
        Err(e) => Err(MidiError::PersistenceFailed {
            reason: format!("failed to move artifact into recordings dir: {}", e),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

pub(crate) fn row_to_recording(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recording> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(5)?;
    let file_size: i64 = row.get(6)?;

    // A row the store cannot faithfully map is an error, not a default; a
    // nil id would never resolve for download.
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Recording {
        id,
        filename: row.get(1)?,
        original_filename: row.get(2)?,
        device_name: row.get(3)?,
        duration_secs: row.get(4)?,
        created_at,
        file_size_bytes: file_size as u64,
        midi_event_count: row.get(7)?,
    })
}
