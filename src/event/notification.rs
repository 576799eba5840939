// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification types delivered to the host.

use std::fmt;

use serde::Serialize;

use crate::supervisor::DeviceStatus;

use super::DeviceId;

/// Connection lifecycle milestones reported for a printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    /// A session was created and the first connection attempt is starting.
    Connecting,
    /// The printer is connected.
    Connected,
    /// An established connection was lost and is being re-established.
    Reconnecting,
    /// The session was removed on request.
    Disconnected,
    /// Reconnection gave up; the session needs an explicit reconnect.
    Error,
}

impl LifecycleKind {
    /// Returns the wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages produced by the supervisor for the delivery layer.
///
/// Both shapes serialize to a flat JSON object with a `type` tag, ready to
/// be forwarded to browsers or other consumers.
///
/// # Examples
///
/// ```
/// use bambu_fleet::event::{DeviceId, LifecycleKind, Notification};
///
/// let n = Notification::lifecycle(DeviceId::new("p1s"), LifecycleKind::Connected, "");
/// assert!(n.is_lifecycle());
/// assert_eq!(n.device_id().as_str(), "p1s");
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The latest cached status of one printer.
    StateUpdate(DeviceStatus),

    /// A connection lifecycle event.
    Lifecycle {
        /// The printer the event refers to.
        device_id: DeviceId,
        /// What happened.
        event: LifecycleKind,
        /// Human readable detail, empty when there is nothing to add.
        message: String,
    },
}

impl Notification {
    /// Creates a state update notification.
    #[must_use]
    pub fn state_update(status: DeviceStatus) -> Self {
        Self::StateUpdate(status)
    }

    /// Creates a lifecycle notification.
    #[must_use]
    pub fn lifecycle(device_id: DeviceId, event: LifecycleKind, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            device_id,
            event,
            message: message.into(),
        }
    }

    /// Returns the device the notification refers to.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::StateUpdate(status) => &status.device_id,
            Self::Lifecycle { device_id, .. } => device_id,
        }
    }

    /// Returns the lifecycle kind for lifecycle notifications.
    #[must_use]
    pub fn lifecycle_kind(&self) -> Option<LifecycleKind> {
        match self {
            Self::Lifecycle { event, .. } => Some(*event),
            Self::StateUpdate(_) => None,
        }
    }

    /// Returns `true` if this is a lifecycle notification.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle { .. })
    }

    /// Returns `true` if this is a state update.
    #[must_use]
    pub fn is_state_update(&self) -> bool {
        matches!(self, Self::StateUpdate(_))
    }
}
