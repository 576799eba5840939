// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seam to the external printer client.
//!
//! The client speaks the vendor protocol (MQTT over TLS, command signing,
//! status decoding) and is supplied by the application through a
//! [`ClientFactory`]. This crate only supervises it: it opens and closes
//! sessions, reads its status reports and forwards [`PrinterCommand`]s.
//!
//! Status changes are pushed by the client through the [`UpdateNotifier`]
//! it receives at creation. The notifier may be invoked from any thread,
//! including threads the client owns.
//!
//! [`UpdateNotifier`]: crate::session::UpdateNotifier

mod command;
mod status;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::session::UpdateNotifier;
use crate::supervisor::PrinterConfig;

pub use command::{MAX_TEMPERATURE, PrinterCommand};
pub use status::{
    AmsUnit, Capabilities, Climate, EnumValue, Extruder, PrinterInfo, PrinterStatus, Spool,
};

/// Service-level state of a printer client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// No session has been started.
    #[default]
    NoService,
    /// The session is up and the printer is reachable.
    Connected,
    /// The transport dropped.
    Disconnected,
    /// The session was closed on request.
    Quit,
}

impl ServiceState {
    /// Returns `true` if the client has a live session.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if a previously live session is gone.
    #[must_use]
    pub const fn is_lost(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Quit)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoService => "no_service",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Quit => "quit",
        };
        f.write_str(name)
    }
}

/// Everything a client currently knows about its printer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Service state at the time of the report.
    pub service_state: ServiceState,
    /// Model, firmware and option flags.
    pub info: PrinterInfo,
    /// Live status.
    pub status: PrinterStatus,
}

impl StatusReport {
    /// Creates a report with the given service state and empty status.
    #[must_use]
    pub fn with_state(service_state: ServiceState) -> Self {
        Self {
            service_state,
            ..Self::default()
        }
    }
}

/// A connection to one printer, implemented outside this crate.
#[async_trait]
pub trait PrinterClient: Send + Sync + 'static {
    /// Opens the session. Resolves once the printer is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the printer cannot be reached.
    async fn start_session(&self) -> Result<(), ClientError>;

    /// Closes the session. Must not block.
    fn quit(&self);

    /// Returns the current service state.
    fn service_state(&self) -> ServiceState;

    /// Returns the latest status report.
    fn report(&self) -> StatusReport;

    /// Executes a command on the printer.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is down or the printer rejects the
    /// command.
    async fn execute(&self, command: &PrinterCommand) -> Result<(), ClientError>;
}

/// Creates printer clients from configuration records.
pub trait ClientFactory: Send + Sync + 'static {
    /// Creates a client for `config`.
    ///
    /// The client must report every status change through `notifier`.
    fn create(&self, config: &PrinterConfig, notifier: UpdateNotifier) -> Arc<dyn PrinterClient>;
}
