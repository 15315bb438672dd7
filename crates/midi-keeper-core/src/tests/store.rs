use crate::{MidiError, Recording, RecordingStore};

use std::{fs, time::Duration};

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

pub(crate) fn sample_recording() -> Recording {
    Recording {
        id: Uuid::new_v4(),
        filename: "2026-08-25T10-00-00.000.mid".to_string(),
        original_filename: "midi-capture-2026-08-25T10-00-00.000.mid".to_string(),
        device_name: "KeyLab Essential 61".to_string(),
        duration_secs: Some(12.5),
        created_at: Utc::now(),
        file_size_bytes: 4,
        midi_event_count: None,
    }
}

fn artifact_in(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, b"MThd").unwrap();
    path
}

/// WHAT: Persist moves the artifact and the row round-trips through list
/// WHY: A recording must be addressable and downloadable once reported
#[test]
fn given_artifact_when_persisted_then_listed_and_resolvable() {
    // Given: A finished capture artifact in a scratch directory
    let temp = TempDir::new().unwrap();
    let recordings_dir = temp.path().join("recordings");
    let store = RecordingStore::open_in_memory(&recordings_dir).unwrap();
    let artifact = artifact_in(&temp, "midi-capture-test.mid");

    // When: Persisting it
    let recording = store.persist(&artifact, "KeyLab Essential 61").unwrap();

    // Then: The artifact moved into the recordings directory
    assert!(!artifact.exists());
    let final_path = store.resolve_path(recording.id).unwrap();
    assert!(final_path.exists());
    assert!(recording.filename.ends_with(".mid"));
    assert_eq!(recording.original_filename, "midi-capture-test.mid");
    assert_eq!(recording.file_size_bytes, 4);
    assert_eq!(recording.duration_secs, None);

    // Then: The listing returns the same row
    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, recording.id);
    assert_eq!(listed[0].device_name, "KeyLab Essential 61");
}

/// WHAT: Listing returns recordings newest first
/// WHY: Clients show the latest take at the top
#[test]
fn given_two_recordings_when_listed_then_newest_first() {
    let temp = TempDir::new().unwrap();
    let store = RecordingStore::open_in_memory(&temp.path().join("recordings")).unwrap();

    let first = store
        .persist(&artifact_in(&temp, "a.mid"), "Device A")
        .unwrap();
    // created_at has millisecond precision in the filename and the row
    std::thread::sleep(Duration::from_millis(5));
    let second = store
        .persist(&artifact_in(&temp, "b.mid"), "Device B")
        .unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}

/// WHAT: Duration back-fill lands on the row
/// WHY: Duration is only known after capture stops; the row exists first
#[test]
fn given_persisted_recording_when_backfilled_then_duration_stored() {
    let temp = TempDir::new().unwrap();
    let store = RecordingStore::open_in_memory(&temp.path().join("recordings")).unwrap();
    let recording = store
        .persist(&artifact_in(&temp, "take.mid"), "Device")
        .unwrap();

    store.backfill_duration(recording.id, 7.25).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed[0].duration_secs, Some(7.25));
}

/// WHAT: Unknown ids surface NotFound from lookup and back-fill
/// WHY: Callers map this to a 404 rather than a storage fault
#[test]
fn given_unknown_id_when_resolved_then_not_found() {
    let temp = TempDir::new().unwrap();
    let store = RecordingStore::open_in_memory(&temp.path().join("recordings")).unwrap();
    let id = Uuid::new_v4();

    assert!(matches!(
        store.resolve_path(id),
        Err(MidiError::NotFound { id: missing, .. }) if missing == id
    ));
    assert!(matches!(
        store.backfill_duration(id, 1.0),
        Err(MidiError::NotFound { .. })
    ));
}

/// WHAT: A missing artifact fails persistence without a metadata row
/// WHY: The table must never reference a file that was not moved in
#[test]
fn given_missing_artifact_when_persisted_then_error_and_no_row() {
    let temp = TempDir::new().unwrap();
    let store = RecordingStore::open_in_memory(&temp.path().join("recordings")).unwrap();

    let result = store.persist(&temp.path().join("vanished.mid"), "Device");

    assert!(matches!(result, Err(MidiError::PersistenceFailed { .. })));
    assert!(store.list().unwrap().is_empty());
}

/// WHAT: Corrupt id or timestamp columns fail row mapping
/// WHY: A defaulted nil id would list a recording that can never download
#[test]
fn given_corrupt_columns_when_mapping_rows_then_error() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE recordings (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            device_name TEXT NOT NULL,
            duration REAL,
            created_at TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            midi_event_count INTEGER
        );
        INSERT INTO recordings VALUES
            ('not-a-uuid', 'a.mid', 'a.mid', 'Device', NULL,
             '2026-08-25T10:00:00+00:00', 4, NULL),
            ('5f0c9be5-3a52-4b39-9b1a-49a0f54b1c51', 'b.mid', 'b.mid',
             'Device', NULL, 'yesterday-ish', 4, NULL);
        "#,
    )
    .unwrap();

    let mut stmt = conn
        .prepare(
            "SELECT id, filename, original_filename, device_name, duration,
             created_at, file_size, midi_event_count FROM recordings ORDER BY id",
        )
        .unwrap();
    let rows: Vec<_> = stmt
        .query_map([], crate::store::row_to_recording)
        .unwrap()
        .collect();

    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_err());
    assert!(rows[1].is_err());
}

/// WHAT: Recording JSON uses camelCase wire names
/// WHY: Clients read deviceName/durationSecs/createdAt exactly
#[test]
fn given_recording_when_serialized_then_camel_case() {
    let value = serde_json::to_value(sample_recording()).unwrap();

    assert!(value["id"].is_string());
    assert!(value["deviceName"].is_string());
    assert!(value["durationSecs"].is_number());
    assert!(value["createdAt"].is_string());
    assert!(value["fileSizeBytes"].is_number());
    assert!(value["originalFilename"].is_string());
}
