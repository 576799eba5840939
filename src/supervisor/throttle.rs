// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Leading-edge throttle for raw status updates.

use std::time::Duration;

use tokio::time::Instant;

/// Lets through the first event of each interval and drops the rest.
///
/// Dropped events are not queued: the next accepted event carries whatever
/// state is current at that moment.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use bambu_fleet::supervisor::Throttle;
///
/// let mut throttle = Throttle::new(Duration::from_secs(1));
/// let start = Instant::now();
///
/// assert!(throttle.try_acquire(start));
/// assert!(!throttle.try_acquire(start + Duration::from_millis(999)));
/// assert!(throttle.try_acquire(start + Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    /// Creates a throttle. A zero interval accepts every event.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns the throttle interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and starts a new interval if the event at `now` may be
    /// processed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last
            && now.saturating_duration_since(last) < self.interval
        {
            return false;
        }
        self.last = Some(now);
        true
    }

    /// Forgets the last accepted event so the next one passes.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
