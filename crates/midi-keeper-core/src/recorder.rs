//! Recording state machine.
//!
//! Three states: idle, armed (hooked, waiting for activity), and live
//! (capture process running). Activity signals auto-start a session when
//! armed and re-arm the inactivity timer while live; the timer elapsing
//! stops and persists the session. All transitions run under a single
//! async mutex, so every observer sees one consistent state.

use crate::{
    CoreResult, MidiError,
    capture::{CaptureDriver, DriverProcess},
    device::DeviceBinding,
    event::{ErrorNotice, Event, EventBus, HookNotice, StatusSnapshot, StopReason, StoppedNotice},
    store::{Recording, RecordingStore},
};

use std::{panic::Location, path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use error_location::ErrorLocation;
use tokio::{
    sync::{Mutex, MutexGuard, watch},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, error, info, instrument, warn};

/// A capture session in flight.
struct LiveSession {
    started_at: Instant,
    started_wall: DateTime<Utc>,
    device_name: String,
    artifact: PathBuf,
    capture: Box<dyn DriverProcess>,
}

#[derive(Default)]
struct Inner {
    hooked: bool,
    session: Option<LiveSession>,
    idle_timer: Option<JoinHandle<()>>,
    /// Bumped on every session boundary; a timer armed for an older epoch
    /// finds itself stale and does nothing.
    epoch: u64,
    last_recording: Option<Recording>,
    last_activity_at: Option<DateTime<Utc>>,
}

/// The recording coordinator.
///
/// Owns the hook flag, the live session, and the inactivity timer. Reads
/// the current device binding through a watch channel owned by the device
/// session, so there is no reference cycle between the two.
pub struct Recorder {
    driver: Arc<dyn CaptureDriver>,
    store: Arc<RecordingStore>,
    events: EventBus,
    binding: watch::Receiver<Option<DeviceBinding>>,
    inactivity_window: Duration,
    temp_dir: PathBuf,
    inner: Mutex<Inner>,
}

impl Recorder {
    pub(crate) fn new(
        driver: Arc<dyn CaptureDriver>,
        store: Arc<RecordingStore>,
        events: EventBus,
        binding: watch::Receiver<Option<DeviceBinding>>,
        inactivity_window: Duration,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            driver,
            store,
            events,
            binding,
            inactivity_window,
            temp_dir,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Arm the system: the next activity signal auto-starts a session.
    ///
    /// Hooking while already hooked is a no-op that still re-announces the
    /// hook state, so a reconnecting client converges.
    #[track_caller]
    #[instrument(skip(self))]
    pub async fn hook(&self) -> CoreResult<()> {
        let caller = ErrorLocation::from(Location::caller());
        let mut inner = self.inner.lock().await;
        if self.binding.borrow().is_none() {
            return Err(MidiError::NoDeviceConnected { location: caller });
        }

        inner.hooked = true;
        info!("hooked for recording");
        self.events.emit(Event::HookStatusChanged {
            data: HookNotice { is_hooked: true },
        });
        Ok(())
    }

    /// Disarm the system. A live session is stopped and persisted.
    #[instrument(skip(self))]
    pub async fn unhook(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.hooked = false;
        clear_idle_timer(&mut inner);

        info!("unhooked from recording");
        self.events.emit(Event::HookStatusChanged {
            data: HookNotice { is_hooked: false },
        });

        if inner.session.is_some() {
            self.finish_session(&mut inner, StopReason::Unhook).await?;
        }
        Ok(())
    }

    /// Start a capture session immediately, without arming.
    ///
    /// Refused while hooked or while a session is already live.
    #[track_caller]
    #[instrument(skip(self))]
    pub async fn start_recording(self: &Arc<Self>) -> CoreResult<()> {
        let caller = ErrorLocation::from(Location::caller());
        let mut inner = self.inner.lock().await;
        if inner.hooked || inner.session.is_some() {
            return Err(MidiError::AlreadyActive { location: caller });
        }

        let Some(binding) = self.binding.borrow().clone() else {
            return Err(MidiError::NoDeviceConnected { location: caller });
        };

        self.begin_session(&mut inner, &binding).await
    }

    /// Stop the live session and persist its artifact.
    #[instrument(skip(self))]
    pub async fn stop_recording(&self) -> CoreResult<Recording> {
        let mut inner = self.inner.lock().await;
        self.finish_session(&mut inner, StopReason::Manual).await
    }

    /// Handle one raw activity signal from the device monitor.
    #[instrument(skip(self))]
    pub async fn on_activity(self: &Arc<Self>) {
        let now = Utc::now();
        self.events.emit(Event::MidiActivity {
            timestamp: now.timestamp_millis(),
        });

        let mut inner = self.inner.lock().await;
        inner.last_activity_at = Some(now);

        if inner.session.is_some() {
            self.arm_idle_timer(&mut inner);
            return;
        }

        if !inner.hooked {
            return;
        }

        let Some(binding) = self.binding.borrow().clone() else {
            return;
        };

        if let Err(e) = self.begin_session(&mut inner, &binding).await {
            error!(error = %e, "failed to auto-start recording");
            self.events.emit(Event::RecordingError {
                error: ErrorNotice {
                    kind: "autoStartFailed".to_string(),
                    message: e.to_string(),
                },
            });
        }
    }

    /// Handle loss of the bound device.
    ///
    /// A live capture cannot survive its device; the session is torn down
    /// and its partial artifact is abandoned in the temp directory.
    #[instrument(skip(self))]
    pub async fn on_device_lost(&self) {
        let mut inner = self.inner.lock().await;
        clear_idle_timer(&mut inner);
        inner.epoch += 1;

        if let Some(session) = inner.session.take() {
            warn!(
                artifact = %session.artifact.display(),
                "device lost mid-session, discarding capture"
            );
            if let Err(e) = session.capture.stop().await {
                warn!(error = %e, "failed to stop orphaned capture process");
            }
        }

        if inner.hooked {
            inner.hooked = false;
            self.events.emit(Event::RecordingError {
                error: ErrorNotice {
                    kind: "deviceDisconnected".to_string(),
                    message: "Device disconnected while hooked for recording".to_string(),
                },
            });
            self.events.emit(Event::HookStatusChanged {
                data: HookNotice { is_hooked: false },
            });
        }
    }

    /// Current state, readable without disturbing the machine.
    pub async fn status(&self) -> StatusSnapshot {
        let inner = self.inner.lock().await;
        let binding = self.binding.borrow().clone();

        StatusSnapshot {
            is_device_connected: binding.is_some(),
            connected_device: binding.map(|b| b.name),
            is_recording: inner.session.is_some(),
            is_hooked_for_recording: inner.hooked,
            recording_duration_secs: inner
                .session
                .as_ref()
                .map(|s| s.started_at.elapsed().as_secs())
                .unwrap_or(0),
            last_activity_at: inner.last_activity_at,
            last_recording: inner.last_recording.clone(),
        }
    }

    /// Start a capture process and install the live session.
    async fn begin_session(
        self: &Arc<Self>,
        inner: &mut MutexGuard<'_, Inner>,
        binding: &DeviceBinding,
    ) -> CoreResult<()> {
        let started_wall = Utc::now();
        let artifact = self.temp_dir.join(format!(
            "midi-capture-{}.mid",
            started_wall.format("%Y-%m-%dT%H-%M-%S%.3f")
        ));

        let capture = self.driver.start_capture(&binding.port, &artifact).await?;

        inner.epoch += 1;
        inner.session = Some(LiveSession {
            started_at: Instant::now(),
            started_wall,
            device_name: binding.name.clone(),
            artifact,
            capture,
        });
        self.arm_idle_timer(inner);

        info!(device = %binding.name, "recording session started");
        Ok(())
    }

    /// Stop the live session, persist it, and announce the result.
    #[track_caller]
    async fn finish_session(
        &self,
        inner: &mut MutexGuard<'_, Inner>,
        reason: StopReason,
    ) -> CoreResult<Recording> {
        let caller = ErrorLocation::from(Location::caller());
        clear_idle_timer(inner);

        let Some(session) = inner.session.take() else {
            return Err(MidiError::NoActiveRecording { location: caller });
        };
        inner.epoch += 1;

        let duration_secs = session.started_at.elapsed().as_secs_f64();

        // A capture that will not die is logged but does not block
        // persistence; the artifact on disk is whatever it managed to write.
        if let Err(e) = session.capture.stop().await {
            warn!(error = %e, "capture process did not stop cleanly");
        }

        let mut recording = self
            .store
            .persist(&session.artifact, &session.device_name)?;
        self.store.backfill_duration(recording.id, duration_secs)?;
        recording.duration_secs = Some(duration_secs);

        info!(
            id = %recording.id,
            ?reason,
            duration_secs,
            started_at = %session.started_wall,
            "recording stopped and persisted"
        );

        inner.last_recording = Some(recording.clone());
        self.events.emit(Event::RecordingStopped {
            data: StoppedNotice {
                reason,
                recording: recording.clone(),
            },
        });

        Ok(recording)
    }

    /// (Re)start the inactivity countdown for the live session.
    fn arm_idle_timer(self: &Arc<Self>, inner: &mut MutexGuard<'_, Inner>) {
        clear_idle_timer(inner);

        let epoch = inner.epoch;
        let window = self.inactivity_window;
        let recorder = Arc::clone(self);
        inner.idle_timer = Some(tokio::spawn(async move {
            time::sleep(window).await;
            recorder.on_idle_deadline(epoch).await;
        }));
    }

    /// Fired when the inactivity window elapses without a new signal.
    async fn on_idle_deadline(self: Arc<Self>, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch || inner.session.is_none() {
            debug!("stale inactivity deadline ignored");
            return;
        }

        // inner.idle_timer is this task's own handle. Take it without
        // aborting; an abort would cancel this task at its next await,
        // mid-stop, and the recording would never persist.
        inner.idle_timer.take();

        info!("inactivity window elapsed, stopping recording");
        if let Err(e) = self.finish_session(&mut inner, StopReason::Inactivity).await {
            error!(error = %e, "failed to persist recording after inactivity stop");
            self.events.emit(Event::RecordingError {
                error: ErrorNotice {
                    kind: "saveFailed".to_string(),
                    message: "Failed to save recording".to_string(),
                },
            });
        }
    }
}

fn clear_idle_timer(inner: &mut Inner) {
    if let Some(timer) = inner.idle_timer.take() {
        timer.abort();
    }
}
