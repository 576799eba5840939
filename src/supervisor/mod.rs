// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection supervisor for multiple printers.
//!
//! The [`Supervisor`] owns one [`Session`](crate::session::Session) per
//! configured printer and keeps it connected:
//!
//! - **Idempotent connect**: at most one live session per device ID
//! - **Background retries**: initial connection attempts repeat every
//!   [`SupervisorConfig::retry_interval`] until cancelled
//! - **Drop recovery**: a session that drops is reconnected with the
//!   bounded backoff of [`ReconnectionPolicy`]
//! - **Throttled updates**: raw client updates become at most one
//!   [`Notification`](crate::event::Notification) per
//!   [`SupervisorConfig::update_throttle`]
//!
//! # Connection states
//!
//! ```text
//! Pending -> Connecting -> Connected <-> Reconnecting -> Error
//!        any state -> Disconnected (on disconnect)
//! ```

mod config;
mod connection_supervisor;
mod managed;
mod throttle;

use std::collections::HashMap;

use crate::event::DeviceId;

pub use config::{DEFAULT_MQTT_PORT, PrinterConfig, ReconnectionPolicy, SupervisorConfig};
pub use connection_supervisor::{CONNECTION_LOST, Supervisor, TestConnectionResult};
pub use managed::{ConnectionState, DeviceStatus};
pub use throttle::Throttle;

/// Source of printer configurations for consumers that only know a device ID.
pub trait ConfigLookup: Send + Sync {
    /// Returns the configuration of `device_id`, if known.
    fn printer_config(&self, device_id: &DeviceId) -> Option<PrinterConfig>;
}

impl ConfigLookup for Supervisor {
    fn printer_config(&self, device_id: &DeviceId) -> Option<PrinterConfig> {
        Supervisor::printer_config(self, device_id)
    }
}

impl ConfigLookup for HashMap<DeviceId, PrinterConfig> {
    fn printer_config(&self, device_id: &DeviceId) -> Option<PrinterConfig> {
        self.get(device_id).cloned()
    }
}
