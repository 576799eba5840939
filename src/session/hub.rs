// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordered subscriber list for raw status updates.
//!
//! - [`SubscriptionId`] - Identifies one subscriber so it can detach
//! - [`UpdateHub`] - Holds the subscribers of one session
//! - [`UpdateNotifier`] - Handle given to the printer client to publish updates

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::client::StatusReport;

/// Unique identifier for a subscription.
///
/// Returned by [`UpdateHub::subscribe`] and used to detach later. IDs are
/// unique within one hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type UpdateCallback = Arc<dyn Fn(&StatusReport) + Send + Sync>;

/// Subscribers to one session's raw status updates.
///
/// Subscribers are called in registration order. Dispatch works on a copy of
/// the list, so a subscriber may subscribe or unsubscribe from inside its
/// own callback.
pub struct UpdateHub {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, UpdateCallback)>>,
}

impl UpdateHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Appends a subscriber.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StatusReport) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(callback)));
        id
    }

    /// Removes a subscriber.
    ///
    /// Returns `true` if the subscriber was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Removes every subscriber.
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }

    /// Calls every subscriber with `report`.
    pub fn dispatch(&self, report: &StatusReport) {
        let subscribers: Vec<UpdateCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in subscribers {
            callback(report);
        }
    }

    /// Returns a notifier that publishes into this hub.
    #[must_use]
    pub fn notifier(self: &Arc<Self>) -> UpdateNotifier {
        UpdateNotifier {
            hub: Arc::clone(self),
        }
    }
}

impl Default for UpdateHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UpdateHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHub")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Publishing handle given to a printer client.
///
/// The client calls [`notify`](Self::notify) whenever new status data
/// arrives, from whatever thread it runs on.
#[derive(Clone, Debug)]
pub struct UpdateNotifier {
    hub: Arc<UpdateHub>,
}

impl UpdateNotifier {
    /// Publishes a status report to every subscriber.
    pub fn notify(&self, report: &StatusReport) {
        self.hub.dispatch(report);
    }
}
