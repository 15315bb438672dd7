use crate::{
    CaptureDriver, Event, MidiError, MidiSystem, RecordingStore, SystemOptions,
    tests::fake::FakeDriver,
};

use std::{
    fs,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use tempfile::TempDir;
use tokio::task::yield_now;

fn system_with(driver: Arc<FakeDriver>, temp: &TempDir) -> MidiSystem {
    let work_dir = temp.path().join("work");
    fs::create_dir_all(&work_dir).unwrap();
    let store = Arc::new(RecordingStore::open_in_memory(&temp.path().join("recordings")).unwrap());

    MidiSystem::new(
        driver as Arc<dyn CaptureDriver>,
        store,
        SystemOptions {
            inactivity_window: Duration::from_secs(3),
            temp_dir: work_dir,
        },
    )
}

async fn settle() {
    for _ in 0..32 {
        yield_now().await;
    }
}

/// WHAT: Connect installs a binding observers can read
/// WHY: Status and the recorder both key off the current binding
#[tokio::test]
async fn given_port_when_connected_then_binding_visible() {
    let temp = TempDir::new().unwrap();
    let driver = Arc::new(FakeDriver::new());
    let system = system_with(Arc::clone(&driver), &temp);

    let binding = system.devices.connect("20:0", "KeyLab").await.unwrap();

    assert_eq!(binding.port, "20:0");
    assert_eq!(binding.name, "KeyLab");
    assert_eq!(system.devices.current_binding(), Some(binding));

    let status = system.recorder.status().await;
    assert!(status.is_device_connected);
    assert_eq!(status.connected_device.as_deref(), Some("KeyLab"));
}

/// WHAT: Connecting again replaces the previous binding
/// WHY: Only one device is bound at a time; the old monitor must die
#[tokio::test]
async fn given_bound_device_when_reconnecting_then_old_monitor_stopped() {
    let temp = TempDir::new().unwrap();
    let driver = Arc::new(FakeDriver::new());
    let system = system_with(Arc::clone(&driver), &temp);

    system.devices.connect("20:0", "KeyLab").await.unwrap();
    system.devices.connect("24:0", "Minilab").await.unwrap();

    assert_eq!(driver.processes_stopped.load(Ordering::SeqCst), 1);
    assert_eq!(
        system.devices.current_binding().map(|b| b.name),
        Some("Minilab".to_string())
    );
}

/// WHAT: A failed monitor start leaves the session disconnected
/// WHY: A half-installed binding would arm the recorder against nothing
#[tokio::test]
async fn given_unavailable_port_when_connecting_then_error_and_unbound() {
    let temp = TempDir::new().unwrap();
    let driver = Arc::new(FakeDriver::new());
    driver.fail_monitor.store(true, Ordering::SeqCst);
    let system = system_with(Arc::clone(&driver), &temp);

    let result = system.devices.connect("99:0", "Ghost").await;

    assert!(matches!(result, Err(MidiError::DeviceUnavailable { .. })));
    assert!(system.devices.current_binding().is_none());
}

/// WHAT: Disconnect with nothing bound is a no-op
/// WHY: Clients may retry disconnect freely
#[tokio::test]
async fn given_unbound_session_when_disconnecting_then_noop() {
    let temp = TempDir::new().unwrap();
    let driver = Arc::new(FakeDriver::new());
    let system = system_with(Arc::clone(&driver), &temp);

    system.devices.disconnect().await;
    system.devices.disconnect().await;

    assert_eq!(driver.processes_stopped.load(Ordering::SeqCst), 0);
}

/// WHAT: A monitor that exits on its own is reported as a device error
/// WHY: Observers need to know the activity stream silently died
#[tokio::test]
async fn given_bound_device_when_monitor_exits_then_device_error_emitted() {
    let temp = TempDir::new().unwrap();
    let driver = Arc::new(FakeDriver::new());
    let system = system_with(Arc::clone(&driver), &temp);
    let mut rx = system.events.subscribe();

    system.devices.connect("20:0", "KeyLab").await.unwrap();
    driver.close_monitor().await;
    settle().await;

    let mut saw_error = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(&event, Event::DeviceError { error } if error.contains("monitor")) {
            saw_error = true;
        }
    }
    assert!(saw_error);
}

/// WHAT: Enumeration passes through the driver's listing
/// WHY: The connect flow shows exactly what the facility reports
#[tokio::test]
async fn given_driver_ports_when_listing_then_passed_through() {
    let temp = TempDir::new().unwrap();
    let driver = Arc::new(FakeDriver::new());
    let system = system_with(Arc::clone(&driver), &temp);

    let ports = system.devices.list_available().await.unwrap();

    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].port, "20:0");
}
