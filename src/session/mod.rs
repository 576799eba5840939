// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One printer connection and its update subscribers.
//!
//! A [`Session`] owns the external [`PrinterClient`] for one device. Status
//! updates pushed by the client fan out through the session's [`UpdateHub`]
//! to every subscriber: the supervisor's state tracking and any number of
//! protocol bridges.

mod hub;

use std::fmt;
use std::sync::Arc;

use crate::client::{ClientFactory, PrinterClient, PrinterCommand, ServiceState, StatusReport};
use crate::error::ClientError;
use crate::event::DeviceId;
use crate::supervisor::PrinterConfig;

pub use hub::{SubscriptionId, UpdateHub, UpdateNotifier};

/// A printer connection shared by the supervisor and its consumers.
pub struct Session {
    device_id: DeviceId,
    name: String,
    client: Arc<dyn PrinterClient>,
    hub: Arc<UpdateHub>,
}

impl Session {
    /// Creates the client for `config` without connecting it.
    #[must_use]
    pub fn open(factory: &dyn ClientFactory, config: &PrinterConfig) -> Self {
        let hub = Arc::new(UpdateHub::new());
        let client = factory.create(config, hub.notifier());
        Self {
            device_id: config.id.clone(),
            name: config.display_name().to_string(),
            client,
            hub,
        }
    }

    /// Returns the device ID.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts the client session.
    ///
    /// # Errors
    ///
    /// Returns the client's error if the printer cannot be reached.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.client.start_session().await
    }

    /// Tells the client to close its session.
    pub fn quit(&self) {
        self.client.quit();
    }

    /// Returns the client's service state.
    #[must_use]
    pub fn service_state(&self) -> ServiceState {
        self.client.service_state()
    }

    /// Returns `true` if the client has a live session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.service_state().is_connected()
    }

    /// Returns the client's latest status report.
    #[must_use]
    pub fn report(&self) -> StatusReport {
        self.client.report()
    }

    /// Forwards a command to the client.
    ///
    /// # Errors
    ///
    /// Returns the client's error if the command fails.
    pub async fn execute(&self, command: &PrinterCommand) -> Result<(), ClientError> {
        self.client.execute(command).await
    }

    /// Subscribes to raw status updates.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StatusReport) + Send + Sync + 'static,
    {
        self.hub.subscribe(callback)
    }

    /// Detaches a subscriber.
    ///
    /// Returns `true` if the subscriber was found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    /// Returns the number of update subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("name", &self.name)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}
