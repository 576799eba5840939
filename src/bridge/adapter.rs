// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Virtual serial port over a printer session.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::command::LegacyCommand;
use crate::client::StatusReport;
use crate::error::{Error, Result};
use crate::event::DeviceId;
use crate::session::{Session, SubscriptionId};
use crate::snapshot::{StateSnapshot, serialize_state};
use crate::supervisor::Supervisor;

/// Baud rate reported to hosts. The port is virtual, so it is informational.
pub const BAUD_RATE: u32 = 115_200;

/// Firmware name reported by `M115`.
pub const FIRMWARE_NAME: &str = "BambuFleet";

/// Default wait of [`BridgeAdapter::read_line`].
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Queue of outbound lines shared with the update callback.
#[derive(Clone)]
struct Outbox {
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<AtomicUsize>,
}

impl Outbox {
    /// Counts the line before sending so a reader never sees it uncounted.
    fn push(&self, line: impl Into<String>) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(line.into()).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Presents one printer session as a Marlin-compatible serial device.
///
/// Lines written to the adapter are parsed as legacy commands and
/// translated into printer commands on the shared session. Replies,
/// acknowledgements and temperature reports are queued and handed out by
/// [`read_line`](Self::read_line).
///
/// The adapter subscribes to the session's update hub, so it coexists with
/// the supervisor's own tracking. Dropping the adapter removes its
/// subscription.
pub struct BridgeAdapter {
    device_id: DeviceId,
    name: String,
    session: Arc<Session>,
    subscription: Mutex<Option<SubscriptionId>>,
    outbox: Outbox,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    closed: Arc<AtomicBool>,
    read_timeout: Duration,
}

impl BridgeAdapter {
    /// Opens a bridge on the session the supervisor holds for `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the supervisor has no session
    /// for the device.
    pub fn open(supervisor: &Supervisor, device_id: &DeviceId) -> Result<Self> {
        let session = supervisor
            .session(device_id)
            .ok_or_else(|| Error::DeviceNotFound(device_id.clone()))?;
        let name = supervisor
            .get_state(device_id)
            .map_or_else(|| session.name().to_string(), |state| state.name);
        Ok(Self::attach(session, name))
    }

    /// Attaches a bridge to an existing session.
    #[must_use]
    pub fn attach(session: Arc<Session>, name: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbox = Outbox {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        };
        let closed = Arc::new(AtomicBool::new(false));

        let subscription = {
            let outbox = outbox.clone();
            let closed = Arc::clone(&closed);
            session.subscribe(move |report: &StatusReport| {
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                let snapshot = serialize_state(report);
                outbox.push(format!(" {}", temperature_report(&snapshot)));
            })
        };

        outbox.push("start");
        outbox.push("ok");

        let name = name.into();
        tracing::info!(device_id = %session.device_id(), port = %format!("BAMBU:{name}"), "Bridge opened");

        Self {
            device_id: session.device_id().clone(),
            name,
            session,
            subscription: Mutex::new(Some(subscription)),
            outbox,
            inbox: tokio::sync::Mutex::new(rx),
            closed,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Sets how long [`read_line`](Self::read_line) waits for a line.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Printer this adapter talks to.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Port name in the form `BAMBU:<printer name>`.
    #[must_use]
    pub fn port_name(&self) -> String {
        format!("BAMBU:{}", self.name)
    }

    /// Always [`BAUD_RATE`].
    #[must_use]
    pub const fn baud_rate(&self) -> u32 {
        BAUD_RATE
    }

    /// Number of lines waiting to be read.
    #[must_use]
    pub fn pending_lines(&self) -> usize {
        self.outbox.pending.load(Ordering::SeqCst)
    }

    /// Returns `true` after [`close`](Self::close) or drop.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Handles one line written by the host.
    ///
    /// Returns the number of bytes consumed. Blank lines are consumed
    /// without a reply. After [`close`](Self::close) nothing is consumed.
    ///
    /// # Errors
    ///
    /// Returns the client error if the printer rejects the translated
    /// command. An `Error:` line is queued for the host as well.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }

        let text = String::from_utf8_lossy(data);
        let Some(command) = LegacyCommand::parse(&text) else {
            return Ok(data.len());
        };
        tracing::debug!(device_id = %self.device_id, ?command, "Bridge command");

        self.dispatch(&command).await?;
        Ok(data.len())
    }

    async fn dispatch(&self, command: &LegacyCommand) -> Result<()> {
        match command {
            LegacyCommand::ReportTemperatures => {
                let snapshot = self.snapshot();
                self.outbox
                    .push(format!("ok {}", temperature_report(&snapshot)));
            }
            LegacyCommand::FirmwareInfo => {
                let snapshot = self.snapshot();
                self.outbox.push(firmware_report(&snapshot));
            }
            LegacyCommand::PrintStatus => {
                let snapshot = self.snapshot();
                self.outbox.push(print_status_report(&snapshot));
            }
            _ => {
                if let Some(printer_command) = command.to_printer_command()
                    && let Err(e) = self.session.execute(&printer_command).await
                {
                    tracing::warn!(
                        device_id = %self.device_id,
                        command = %printer_command,
                        error = %e,
                        "Bridge command failed"
                    );
                    self.outbox.push(format!("Error:{e}"));
                    return Err(e.into());
                }
            }
        }
        if !command.is_query() {
            self.outbox.push("ok");
        }
        Ok(())
    }

    /// Returns the next queued line including its trailing newline.
    ///
    /// Waits up to the read timeout (one second by default) and returns an
    /// empty buffer if nothing arrives.
    pub async fn read_line(&self) -> Vec<u8> {
        let mut inbox = self.inbox.lock().await;
        match tokio::time::timeout(self.read_timeout, inbox.recv()).await {
            Ok(Some(line)) => {
                self.outbox.pending.fetch_sub(1, Ordering::SeqCst);
                let mut bytes = line.into_bytes();
                bytes.push(b'\n');
                bytes
            }
            Ok(None) | Err(_) => Vec::new(),
        }
    }

    /// Detaches from the session. Further writes are ignored.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(id) = self.subscription.lock().take() {
            self.session.unsubscribe(id);
        }
        tracing::info!(device_id = %self.device_id, "Bridge closed");
    }

    fn snapshot(&self) -> StateSnapshot {
        serialize_state(&self.session.report())
    }
}

impl Drop for BridgeAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BridgeAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeAdapter")
            .field("device_id", &self.device_id)
            .field("port", &self.port_name())
            .field("pending_lines", &self.pending_lines())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// `T:<nozzle> /<target> B:<bed> /<target>`, with a `C:` pair when the
/// printer reports a chamber temperature.
#[must_use]
pub fn temperature_report(snapshot: &StateSnapshot) -> String {
    let mut line = format!(
        "T:{:.1} /{:.1} B:{:.1} /{:.1}",
        snapshot.nozzle_temp,
        snapshot.nozzle_temp_target,
        snapshot.bed_temp,
        snapshot.bed_temp_target
    );
    if snapshot.has_chamber_temp {
        line.push_str(&format!(
            " C:{:.1} /{:.1}",
            snapshot.chamber_temp, snapshot.chamber_temp_target
        ));
    }
    line
}

/// The `M115` reply.
#[must_use]
pub fn firmware_report(snapshot: &StateSnapshot) -> String {
    format!(
        "FIRMWARE_NAME:{FIRMWARE_NAME} FIRMWARE_VERSION:{} MACHINE_TYPE:{} PROTOCOL_VERSION:1.0",
        or_unknown(&snapshot.firmware_version),
        or_unknown(&snapshot.printer_model)
    )
}

/// The `M27` reply.
#[must_use]
pub fn print_status_report(snapshot: &StateSnapshot) -> String {
    match snapshot.gcode_state.as_str() {
        "RUNNING" | "PREPARE" => {
            format!("SD printing byte {}/100", snapshot.print_percentage)
        }
        _ => "Not SD printing.".to_string(),
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
