//! Device session management.
//!
//! At most one MIDI device is bound at a time. Binding starts an activity
//! monitor on the chosen port and a relay task that feeds its signals into
//! the recorder; rebinding or disconnecting tears the previous monitor
//! down first.

use crate::{
    CoreResult,
    capture::{ActivityMonitor, CaptureDriver, DriverProcess, MidiPort, MonitorSignal},
    event::{Event, EventBus},
    recorder::Recorder,
};

use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tracing::{info, instrument, warn};

/// The currently bound device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceBinding {
    /// Sequencer port identifier the binding targets.
    #[serde(rename = "portIdentifier")]
    pub port: String,
    /// Display name chosen at connect time.
    #[serde(rename = "displayName")]
    pub name: String,
}

struct BoundDevice {
    monitor: Box<dyn DriverProcess>,
    relay: JoinHandle<()>,
}

/// Owner of the single device binding.
pub struct DeviceSession {
    driver: Arc<dyn CaptureDriver>,
    recorder: Arc<Recorder>,
    events: EventBus,
    binding_tx: watch::Sender<Option<DeviceBinding>>,
    inner: Mutex<Option<BoundDevice>>,
}

impl DeviceSession {
    pub(crate) fn new(
        driver: Arc<dyn CaptureDriver>,
        recorder: Arc<Recorder>,
        events: EventBus,
        binding_tx: watch::Sender<Option<DeviceBinding>>,
    ) -> Self {
        Self {
            driver,
            recorder,
            events,
            binding_tx,
            inner: Mutex::new(None),
        }
    }

    /// Enumerate the ports the driver can currently see.
    pub async fn list_available(&self) -> CoreResult<Vec<MidiPort>> {
        self.driver.list_ports().await
    }

    /// The binding as observers see it.
    pub fn current_binding(&self) -> Option<DeviceBinding> {
        self.binding_tx.borrow().clone()
    }

    /// Bind a device, replacing any existing binding.
    ///
    /// The old monitor is torn down before the new one starts; a failure
    /// starting the new monitor leaves the session disconnected.
    #[instrument(skip(self))]
    pub async fn connect(&self, port: &str, name: &str) -> CoreResult<DeviceBinding> {
        let mut inner = self.inner.lock().await;
        if inner.is_some() {
            self.teardown(&mut inner).await;
        }

        let ActivityMonitor {
            mut signals,
            process,
        } = self.driver.start_monitor(port).await?;

        let recorder = Arc::clone(&self.recorder);
        let events = self.events.clone();
        let relay = tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match signal {
                    MonitorSignal::Activity => recorder.on_activity().await,
                    MonitorSignal::Closed => {
                        warn!("MIDI activity monitor exited");
                        events.emit(Event::DeviceError {
                            error: "MIDI activity monitor exited".to_string(),
                        });
                        break;
                    }
                }
            }
        });

        *inner = Some(BoundDevice {
            monitor: process,
            relay,
        });

        let binding = DeviceBinding {
            port: port.to_string(),
            name: name.to_string(),
        };
        let _ = self.binding_tx.send(Some(binding.clone()));

        info!(port, device = name, "device connected");
        Ok(binding)
    }

    /// Release the current binding. A no-op when nothing is bound.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if inner.is_some() {
            self.teardown(&mut inner).await;
            info!("device disconnected");
        }
    }

    async fn teardown(&self, inner: &mut Option<BoundDevice>) {
        let Some(bound) = inner.take() else {
            return;
        };

        bound.relay.abort();
        if let Err(e) = bound.monitor.stop().await {
            warn!(error = %e, "failed to stop activity monitor");
        }

        self.recorder.on_device_lost().await;
        let _ = self.binding_tx.send(None);
    }
}
