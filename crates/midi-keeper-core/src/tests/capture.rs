use crate::{
    ErrorNotice, Event, HookNotice, MidiPort, StopReason, StoppedNotice,
    capture::parse_port_listing,
};

use serde_json::{Value, json};

/// WHAT: Port listing parser extracts client:port identifiers and names
/// WHY: Enumeration output drives the connect UI; misparses hide devices
#[test]
fn given_arecordmidi_listing_when_parsed_then_ports_extracted() {
    // Given: Real-world enumeration output with a header row
    let listing = "\
 Port    Client name                      Port name
 14:0    Midi Through                     Midi Through Port-0
 20:0    KeyLab Essential 61              KeyLab Essential 61 MIDI
";

    // When: Parsing the listing
    let ports = parse_port_listing(listing);

    // Then: The header is skipped and both ports survive
    assert_eq!(
        ports,
        vec![
            MidiPort {
                port: "14:0".to_string(),
                name: "Midi Through                     Midi Through Port-0".to_string(),
            },
            MidiPort {
                port: "20:0".to_string(),
                name: "KeyLab Essential 61              KeyLab Essential 61 MIDI".to_string(),
            },
        ]
    );
}

/// WHAT: Malformed and empty lines produce no ports
/// WHY: The parser must not invent devices from noise
#[test]
fn given_noise_lines_when_parsed_then_nothing_extracted() {
    assert!(parse_port_listing("").is_empty());
    assert!(parse_port_listing("no ports found\n").is_empty());
    assert!(parse_port_listing("x:y broken identifier\n").is_empty());
    assert!(parse_port_listing(" 20:0\n").is_empty());
}

/// WHAT: Port JSON uses the wire field names
/// WHY: Clients match on portIdentifier/displayName exactly
#[test]
fn given_midi_port_when_serialized_then_wire_names_used() {
    let port = MidiPort {
        port: "20:0".to_string(),
        name: "KeyLab Essential 61".to_string(),
    };

    let value = serde_json::to_value(&port).unwrap();
    assert_eq!(
        value,
        json!({"portIdentifier": "20:0", "displayName": "KeyLab Essential 61"})
    );
}

/// WHAT: Events serialize as type-tagged objects
/// WHY: Observers dispatch on the type field of each frame
#[test]
fn given_events_when_serialized_then_type_tagged() {
    let activity = serde_json::to_value(Event::MidiActivity {
        timestamp: 1_700_000_000_123,
    })
    .unwrap();
    assert_eq!(
        activity,
        json!({"type": "midiActivity", "timestamp": 1_700_000_000_123i64})
    );

    let device_error = serde_json::to_value(Event::DeviceError {
        error: "monitor exited".to_string(),
    })
    .unwrap();
    assert_eq!(
        device_error,
        json!({"type": "deviceError", "error": "monitor exited"})
    );

    let recording_error = serde_json::to_value(Event::RecordingError {
        error: ErrorNotice {
            kind: "saveFailed".to_string(),
            message: "Failed to save recording".to_string(),
        },
    })
    .unwrap();
    assert_eq!(
        recording_error,
        json!({
            "type": "recordingError",
            "error": {"type": "saveFailed", "message": "Failed to save recording"}
        })
    );

    let hook = serde_json::to_value(Event::HookStatusChanged {
        data: HookNotice { is_hooked: true },
    })
    .unwrap();
    assert_eq!(
        hook,
        json!({"type": "hookStatusChanged", "data": {"isHooked": true}})
    );
}

/// WHAT: Stop reasons serialize lowercase inside recordingStopped frames
/// WHY: Clients distinguish inactivity stops from manual ones by string
#[test]
fn given_stopped_event_when_serialized_then_reason_lowercase() {
    let recording = crate::tests::store::sample_recording();
    let value = serde_json::to_value(Event::RecordingStopped {
        data: StoppedNotice {
            reason: StopReason::Inactivity,
            recording,
        },
    })
    .unwrap();

    assert_eq!(value["type"], Value::from("recordingStopped"));
    assert_eq!(value["data"]["reason"], Value::from("inactivity"));
    assert!(value["data"]["recording"]["id"].is_string());
    assert!(value["data"]["recording"]["deviceName"].is_string());
    assert!(value["data"]["recording"]["fileSizeBytes"].is_number());
}
