//! ALSA sequencer capture driver.
//!
//! Uses the command-line tools shipped with alsa-utils: `arecordmidi -l`
//! for enumeration, `aseqdump -p <port>` as the activity monitor, and
//! `arecordmidi -p <port> <file>` as the raw capture process.

use crate::{
    CoreResult, MidiError,
    capture::{ActivityMonitor, CaptureDriver, DriverProcess, MidiPort, MonitorSignal},
};

use std::{panic::Location, path::Path, process::Stdio, time::Duration};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    sync::mpsc,
    time,
};
use tracing::{debug, info, instrument, warn};

/// How long to wait for a signalled child to exit before escalating to
/// SIGKILL.
const EXIT_WAIT: Duration = Duration::from_secs(2);

/// Buffered monitor signals per port.
const MONITOR_CHANNEL_CAPACITY: usize = 64;

/// Driver backed by the ALSA sequencer command-line tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsaDriver;

/// Child process handle for `aseqdump` / `arecordmidi`.
struct AlsaProcess {
    child: Child,
    name: &'static str,
}

#[async_trait]
impl DriverProcess for AlsaProcess {
    async fn stop(mut self: Box<Self>) -> CoreResult<()> {
        // SIGTERM first so arecordmidi finalizes the standard MIDI file;
        // SIGKILL would leave the track header unfinished.
        if let Some(pid) = self.child.id() {
            // SAFETY: signalling our own child pid.
            let _ = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        }

        match time::timeout(EXIT_WAIT, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(process = self.name, ?status, "driver process exited");
                Ok(())
            }
            Ok(Err(source)) => Err(MidiError::from(source)),
            Err(_) => {
                warn!(
                    process = self.name,
                    "process did not exit after SIGTERM, killing"
                );
                self.child.start_kill().map_err(MidiError::from)?;
                let _ = self.child.wait().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CaptureDriver for AlsaDriver {
    #[instrument(skip(self))]
    async fn list_ports(&self) -> CoreResult<Vec<MidiPort>> {
        let output = Command::new("arecordmidi")
            .arg("-l")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MidiError::EnumerationFailed {
                reason: format!("failed to run arecordmidi -l: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if !output.status.success() {
            return Err(MidiError::EnumerationFailed {
                reason: format!("arecordmidi -l exited with {}", output.status),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let ports = parse_port_listing(&listing);
        debug!(count = ports.len(), "enumerated MIDI ports");

        Ok(ports)
    }

    #[instrument(skip(self))]
    async fn start_monitor(&self, port: &str) -> CoreResult<ActivityMonitor> {
        let mut child = Command::new("aseqdump")
            .args(["-p", port])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MidiError::DeviceUnavailable {
                reason: format!("failed to start aseqdump on port {}: {}", port, e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MidiError::DeviceUnavailable {
                reason: "aseqdump stdout was not captured".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        // Every stdout line counts as raw activity; the monitor does no
        // filtering or deduplication of the device protocol.
        let (tx, rx) = mpsc::channel(MONITOR_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(_line)) = lines.next_line().await {
                if tx.send(MonitorSignal::Activity).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(MonitorSignal::Closed).await;
        });

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(line = %line, "aseqdump stderr");
                }
            });
        }

        info!(port, "activity monitor started");

        Ok(ActivityMonitor {
            signals: rx,
            process: Box::new(AlsaProcess {
                child,
                name: "aseqdump",
            }),
        })
    }

    #[instrument(skip(self))]
    async fn start_capture(
        &self,
        port: &str,
        destination: &Path,
    ) -> CoreResult<Box<dyn DriverProcess>> {
        let child = Command::new("arecordmidi")
            .arg("-p")
            .arg(port)
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MidiError::DeviceUnavailable {
                reason: format!("failed to start arecordmidi on port {}: {}", port, e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!(port, destination = %destination.display(), "capture process started");

        Ok(Box::new(AlsaProcess {
            child,
            name: "arecordmidi",
        }))
    }
}

/// Parse `arecordmidi -l` output.
///
/// Lines look like ` 20:0    KeyLab Essential 61    KeyLab Essential 61 MIDI`;
/// the header row and anything without a `client:port` first token is
/// skipped.
pub(crate) fn parse_port_listing(listing: &str) -> Vec<MidiPort> {
    listing
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().splitn(2, char::is_whitespace);
            let port = parts.next()?;
            let name = parts.next()?.trim();
            if !is_port_identifier(port) || name.is_empty() {
                return None;
            }
            Some(MidiPort {
                port: port.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

fn is_port_identifier(token: &str) -> bool {
    let Some((client, port)) = token.split_once(':') else {
        return false;
    };
    !client.is_empty()
        && !port.is_empty()
        && client.chars().all(|c| c.is_ascii_digit())
        && port.chars().all(|c| c.is_ascii_digit())
}
