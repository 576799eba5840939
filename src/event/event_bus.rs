// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delivery sink contract and the broadcast-based default sink.

use tokio::sync::broadcast;

use super::Notification;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Receiver side of supervisor notifications.
///
/// The supervisor calls [`deliver`](Self::deliver) while it holds its session
/// lock, so that a notification can never describe a state the session has
/// already left. Implementations must return promptly and must not call back
/// into the supervisor.
pub trait DeliverySink: Send + Sync + 'static {
    /// Hands one notification to the delivery layer.
    fn deliver(&self, notification: Notification);
}

/// Fan-out delivery sink backed by a tokio broadcast channel.
///
/// Every subscriber gets its own copy of each notification. A subscriber
/// that falls more than the channel capacity behind loses the oldest
/// notifications (it receives `RecvError::Lagged`); publishing never blocks.
///
/// # Examples
///
/// ```
/// use bambu_fleet::event::{DeliverySink, DeviceId, EventBus, LifecycleKind, Notification};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.deliver(Notification::lifecycle(
///     DeviceId::new("p1s"),
///     LifecycleKind::Connecting,
///     "",
/// ));
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to notifications published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes a notification and returns how many subscribers received it.
    #[must_use]
    pub fn publish_counted(&self, notification: Notification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }
}

impl DeliverySink for EventBus {
    fn deliver(&self, notification: Notification) {
        // No subscribers is not an error
        let _ = self.sender.send(notification);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
