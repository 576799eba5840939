// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-printer bookkeeping for the supervisor.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::event::DeviceId;
use crate::session::{Session, SubscriptionId};
use crate::snapshot::StateSnapshot;

use super::config::PrinterConfig;

/// Connection state of a supervised printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Session created, no attempt made yet.
    Pending,
    /// Initial connection attempts in progress.
    Connecting,
    /// Connected and receiving updates.
    Connected,
    /// An established connection dropped and is being restored.
    Reconnecting,
    /// Removed on request.
    Disconnected,
    /// Reconnection gave up.
    Error,
}

impl ConnectionState {
    /// Returns `true` if the printer is connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the lowercase name used in notifications.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached view of one printer, as returned by the supervisor's queries and
/// carried by state update notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// The printer.
    pub device_id: DeviceId,
    /// Display name.
    pub name: String,
    /// Current connection state.
    pub connection_state: ConnectionState,
    /// Printer model, empty until the printer reports it.
    pub model: String,
    /// Last error message, empty after a successful connection.
    pub error: String,
    /// Last processed state snapshot.
    pub snapshot: Option<Arc<StateSnapshot>>,
}

/// The supervisor's record for one live session.
pub(crate) struct ManagedSession {
    pub config: PrinterConfig,
    pub session: Arc<Session>,
    pub state: ConnectionState,
    pub last_snapshot: Option<Arc<StateSnapshot>>,
    pub error: String,
    pub model: String,
    /// Stops the retry and recovery tasks of this session.
    pub cancel: CancellationToken,
    /// Distinguishes this session from earlier ones with the same ID.
    pub generation: u64,
    /// The supervisor's own update subscription on the session.
    pub tracker: Option<SubscriptionId>,
    /// Stops the running recovery task, if any. Child of `cancel`.
    recovery: Option<CancellationToken>,
}

impl ManagedSession {
    pub fn new(config: PrinterConfig, session: Arc<Session>, generation: u64) -> Self {
        Self {
            config,
            session,
            state: ConnectionState::Pending,
            last_snapshot: None,
            error: String::new(),
            model: String::new(),
            cancel: CancellationToken::new(),
            generation,
            tracker: None,
            recovery: None,
        }
    }

    /// Returns `true` if this session still counts as the device's live one.
    ///
    /// `Error` sessions stay in the map for inspection but may be replaced by
    /// a new `connect`.
    pub fn is_live(&self) -> bool {
        !matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Error
        ) && !self.cancel.is_cancelled()
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            device_id: self.config.id.clone(),
            name: self.config.display_name().to_string(),
            connection_state: self.state,
            model: self.model.clone(),
            error: self.error.clone(),
            snapshot: self.last_snapshot.clone(),
        }
    }

    /// Marks the session connected and stops any pending recovery. Returns
    /// `false` if it already was connected.
    pub fn mark_connected(&mut self) -> bool {
        let changed = self.state != ConnectionState::Connected;
        self.state = ConnectionState::Connected;
        self.error.clear();
        self.cancel_recovery();
        changed
    }

    /// Claims the recovery slot.
    ///
    /// Returns the token the new recovery task must watch, or `None` while an
    /// earlier recovery is still running. The recovery task cancels its own
    /// token on exit, which frees the slot.
    pub fn begin_recovery(&mut self) -> Option<CancellationToken> {
        if self.recovery.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return None;
        }
        let token = self.cancel.child_token();
        self.recovery = Some(token.clone());
        Some(token)
    }

    pub fn cancel_recovery(&mut self) {
        if let Some(token) = self.recovery.take() {
            token.cancel();
        }
    }

    /// Stops background work and closes the client.
    pub fn shut_down(&mut self) {
        self.cancel.cancel();
        if let Some(tracker) = self.tracker.take() {
            self.session.unsubscribe(tracker);
        }
        self.session.quit();
        self.state = ConnectionState::Disconnected;
    }
}
