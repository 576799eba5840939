// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Marlin protocol bridge.
//!
//! Lets serial-oriented print hosts drive a managed printer. Each
//! [`BridgeAdapter`] behaves like a serial device: the host writes
//! command lines and reads reply lines.
//!
//! | Line | Effect | Reply |
//! |------|--------|-------|
//! | `M105` | none | `ok T:.. /.. B:.. /..` |
//! | `M115` | none | firmware line, `ok` |
//! | `M104 S<t>` / `M140 S<t>` | nozzle / bed target | `ok` |
//! | `M106 S<0-255>` / `M107` | part fan | `ok` |
//! | `M24` / `M25` | resume / pause | `ok` |
//! | `M27` | none | progress line, `ok` |
//! | other `M`, `G`, `T` | sent as G-code | `ok` |
//!
//! Temperature lines are also queued on every state update from the
//! printer.

mod adapter;
mod command;

pub use adapter::{
    BAUD_RATE, BridgeAdapter, DEFAULT_READ_TIMEOUT, FIRMWARE_NAME, firmware_report,
    print_status_report, temperature_report,
};
pub use command::LegacyCommand;
