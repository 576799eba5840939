// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `bambu_fleet` - session management for a fleet of Bambu Lab printers.
//!
//! The crate keeps one long-lived session per configured printer and
//! exposes its state to several consumers at once.
//!
//! # Components
//!
//! - **Connection supervisor** ([`Supervisor`]): owns one session per
//!   printer, retries failed connects, recovers dropped connections and
//!   publishes state updates.
//! - **State serializer** ([`serialize_state`]): turns a raw status report
//!   into a flat, JSON-friendly [`StateSnapshot`].
//! - **Delivery sink** ([`DeliverySink`], [`EventBus`]): where state updates
//!   and lifecycle events go.
//! - **Stream proxy** ([`camera::StreamProxy`]): shares one camera capture
//!   per printer between any number of viewers.
//! - **Protocol bridge** ([`bridge::BridgeAdapter`]): speaks Marlin G-code
//!   so serial-oriented hosts can drive a printer.
//!
//! The printer transport itself lives outside this crate. Hosts supply it
//! through the [`PrinterClient`] and [`ClientFactory`] traits.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use bambu_fleet::{EventBus, PrinterConfig, Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> bambu_fleet::Result<()> {
//!     let bus = Arc::new(EventBus::new());
//!     let mut events = bus.subscribe();
//!
//!     let supervisor = Supervisor::new(
//!         Arc::new(MyClientFactory::default()),
//!         bus.clone(),
//!         SupervisorConfig::default(),
//!     );
//!
//!     supervisor.connect(
//!         PrinterConfig::new("x1c", "192.168.1.40", "12345678", "00M09A350100123")
//!             .with_name("Workshop X1C"),
//!     )?;
//!
//!     while let Ok(notification) = events.recv().await {
//!         println!("{}", serde_json::to_string(&notification).unwrap());
//!     }
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod camera;
pub mod client;
pub mod error;
pub mod event;
pub mod session;
pub mod snapshot;
pub mod supervisor;
pub mod types;

pub use client::{
    ClientFactory, PrinterClient, PrinterCommand, PrinterInfo, PrinterStatus, ServiceState,
    StatusReport,
};
pub use error::{CameraError, ClientError, ConfigError, Error, Result, ValueError};
pub use event::{DeliverySink, DeviceId, EventBus, LifecycleKind, Notification};
pub use session::{Session, SubscriptionId, UpdateNotifier};
pub use snapshot::{StateSnapshot, serialize_state};
pub use supervisor::{
    ConfigLookup, ConnectionState, DeviceStatus, PrinterConfig, ReconnectionPolicy, Supervisor,
    SupervisorConfig, TestConnectionResult,
};
pub use types::{Percent, PlateType, PrintOption, SpeedLevel};
