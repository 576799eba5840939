// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound notifications.
//!
//! The supervisor reports two kinds of [`Notification`]: throttled state
//! updates carrying the latest [`StateSnapshot`](crate::snapshot::StateSnapshot),
//! and connection lifecycle events. They are handed to a [`DeliverySink`];
//! the bundled [`EventBus`] fans them out over a tokio broadcast channel.
//!
//! # Examples
//!
//! ```
//! use bambu_fleet::event::{DeliverySink, DeviceId, EventBus, LifecycleKind, Notification};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.deliver(Notification::lifecycle(DeviceId::new("p1s"), LifecycleKind::Connected, ""));
//! ```

mod device_id;
mod event_bus;
mod notification;

pub use device_id::DeviceId;
pub use event_bus::{DeliverySink, EventBus};
pub use notification::{LifecycleKind, Notification};
