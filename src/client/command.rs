// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands forwarded to a printer client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Percent, PlateType, PrintOption, SpeedLevel};

/// Highest target temperature accepted for any heater, in °C.
pub const MAX_TEMPERATURE: u16 = 350;

/// A command a printer client knows how to execute.
///
/// The client owns the wire encoding (including any signing); this enum
/// only names the operation and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PrinterCommand {
    /// Pause the running print.
    Pause,
    /// Resume a paused print.
    Resume,
    /// Abort the running print.
    Stop,
    /// Change the print speed profile.
    SetSpeedLevel { level: SpeedLevel },
    /// Switch the chamber light.
    SetLight { on: bool },
    /// Set the bed target temperature in °C.
    SetBedTemperature { celsius: u16 },
    /// Set the active nozzle target temperature in °C.
    SetNozzleTemperature { celsius: u16 },
    /// Set the chamber target temperature in °C.
    SetChamberTemperature { celsius: u16 },
    /// Set the part cooling fan speed.
    SetPartFan { speed: Percent },
    /// Set the auxiliary fan speed.
    SetAuxFan { speed: Percent },
    /// Set the exhaust fan speed.
    SetExhaustFan { speed: Percent },
    /// Send raw G-code.
    SendGcode { gcode: String },
    /// Start printing a file already on the printer's storage.
    StartPrint {
        file: String,
        plate: u32,
        bed_type: PlateType,
        use_ams: bool,
        ams_mapping: Vec<i32>,
    },
    /// Load filament from an AMS slot.
    LoadFilament { slot_id: u8, ams_id: u8 },
    /// Unload the filament currently in the extruder.
    UnloadFilament { ams_id: u8 },
    /// Start drying filament in an AMS unit.
    StartAmsDryer {
        ams_id: u8,
        celsius: u16,
        duration_minutes: u32,
    },
    /// Stop drying filament in an AMS unit.
    StopAmsDryer { ams_id: u8 },
    /// Toggle a printer option.
    SetPrintOption { option: PrintOption, enabled: bool },
    /// Ask the printer to push a full status report.
    Refresh,
}

impl PrinterCommand {
    /// Returns a short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::SetSpeedLevel { .. } => "set_speed_level",
            Self::SetLight { .. } => "set_light",
            Self::SetBedTemperature { .. } => "set_bed_temperature",
            Self::SetNozzleTemperature { .. } => "set_nozzle_temperature",
            Self::SetChamberTemperature { .. } => "set_chamber_temperature",
            Self::SetPartFan { .. } => "set_part_fan",
            Self::SetAuxFan { .. } => "set_aux_fan",
            Self::SetExhaustFan { .. } => "set_exhaust_fan",
            Self::SendGcode { .. } => "send_gcode",
            Self::StartPrint { .. } => "start_print",
            Self::LoadFilament { .. } => "load_filament",
            Self::UnloadFilament { .. } => "unload_filament",
            Self::StartAmsDryer { .. } => "start_ams_dryer",
            Self::StopAmsDryer { .. } => "stop_ams_dryer",
            Self::SetPrintOption { .. } => "set_print_option",
            Self::Refresh => "refresh",
        }
    }

    /// Builds a bed temperature command, clamping to [`MAX_TEMPERATURE`].
    #[must_use]
    pub fn bed_temperature(celsius: f64) -> Self {
        Self::SetBedTemperature {
            celsius: clamp_temperature(celsius),
        }
    }

    /// Builds a nozzle temperature command, clamping to [`MAX_TEMPERATURE`].
    #[must_use]
    pub fn nozzle_temperature(celsius: f64) -> Self {
        Self::SetNozzleTemperature {
            celsius: clamp_temperature(celsius),
        }
    }
}

impl fmt::Display for PrinterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetBedTemperature { celsius }
            | Self::SetNozzleTemperature { celsius }
            | Self::SetChamberTemperature { celsius } => {
                write!(f, "{} {celsius}°C", self.name())
            }
            Self::SetPartFan { speed }
            | Self::SetAuxFan { speed }
            | Self::SetExhaustFan { speed } => write!(f, "{} {speed}", self.name()),
            Self::SendGcode { gcode } => write!(f, "send_gcode {gcode:?}"),
            _ => f.write_str(self.name()),
        }
    }
}

// Fractional targets are truncated, negative and NaN inputs become 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_temperature(celsius: f64) -> u16 {
    if celsius.is_nan() {
        return 0;
    }
    celsius.clamp(0.0, f64::from(MAX_TEMPERATURE)) as u16
}
