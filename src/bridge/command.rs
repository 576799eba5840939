// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing of Marlin-style command lines.

use crate::client::PrinterCommand;
use crate::types::Percent;

/// A command line received over the virtual serial port.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyCommand {
    /// `M105`: report temperatures.
    ReportTemperatures,
    /// `M115`: report firmware information.
    FirmwareInfo,
    /// `M104 S<temp>`: set the hotend target.
    SetHotendTemperature(f64),
    /// `M140 S<temp>`: set the bed target.
    SetBedTemperature(f64),
    /// `M106 S<0-255>`: set the part cooling fan.
    SetFanSpeed(Percent),
    /// `M107`: part cooling fan off.
    FanOff,
    /// `M24`: resume the print.
    Resume,
    /// `M25`: pause the print.
    Pause,
    /// `M27`: report print progress.
    PrintStatus,
    /// A `G` or `T` line, forwarded as G-code.
    Gcode(String),
    /// Any other `M` code, forwarded verbatim.
    Raw(String),
    /// Anything else; acknowledged and dropped.
    Ignored(String),
}

impl LegacyCommand {
    /// Parses one line.
    ///
    /// Surrounding whitespace, a leading `N<line>` number and a trailing
    /// `*<checksum>` are removed first. Returns `None` for a blank line.
    ///
    /// # Examples
    ///
    /// ```
    /// use bambu_fleet::bridge::LegacyCommand;
    /// use bambu_fleet::types::Percent;
    ///
    /// assert_eq!(LegacyCommand::parse("M105"), Some(LegacyCommand::ReportTemperatures));
    /// assert_eq!(
    ///     LegacyCommand::parse("N12 M106 S128*77"),
    ///     Some(LegacyCommand::SetFanSpeed(Percent::new(50).unwrap()))
    /// );
    /// assert_eq!(LegacyCommand::parse("   "), None);
    /// ```
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = strip_framing(line);
        if line.is_empty() {
            return None;
        }

        let Some(code) = mcode(line) else {
            if line.starts_with('G') || line.starts_with('T') {
                return Some(Self::Gcode(line.to_string()));
            }
            return Some(Self::Ignored(line.to_string()));
        };

        let command = match code {
            105 => Self::ReportTemperatures,
            115 => Self::FirmwareInfo,
            104 => Self::SetHotendTemperature(param(line, 'S').unwrap_or(0.0)),
            140 => Self::SetBedTemperature(param(line, 'S').unwrap_or(0.0)),
            106 => Self::SetFanSpeed(Percent::from_pwm(pwm(param(line, 'S').unwrap_or(255.0)))),
            107 => Self::FanOff,
            24 => Self::Resume,
            25 => Self::Pause,
            27 => Self::PrintStatus,
            _ => Self::Raw(line.to_string()),
        };
        Some(command)
    }

    /// Returns `true` for commands answered by their report alone.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Self::ReportTemperatures)
    }

    /// Returns the printer command this line maps to, if any.
    ///
    /// Reports and ignored lines map to nothing.
    #[must_use]
    pub fn to_printer_command(&self) -> Option<PrinterCommand> {
        let command = match self {
            Self::SetHotendTemperature(celsius) => PrinterCommand::nozzle_temperature(*celsius),
            Self::SetBedTemperature(celsius) => PrinterCommand::bed_temperature(*celsius),
            Self::SetFanSpeed(speed) => PrinterCommand::SetPartFan { speed: *speed },
            Self::FanOff => PrinterCommand::SetPartFan {
                speed: Percent::MIN,
            },
            Self::Resume => PrinterCommand::Resume,
            Self::Pause => PrinterCommand::Pause,
            Self::Gcode(line) | Self::Raw(line) => PrinterCommand::SendGcode {
                gcode: line.clone(),
            },
            Self::ReportTemperatures | Self::FirmwareInfo | Self::PrintStatus | Self::Ignored(_) => {
                return None;
            }
        };
        Some(command)
    }
}

/// Strips whitespace, line numbers and checksums.
fn strip_framing(line: &str) -> &str {
    let mut line = line.trim();
    if let Some((body, _checksum)) = line.split_once('*') {
        line = body.trim_end();
    }
    if let Some(rest) = line.strip_prefix('N') {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 {
            line = rest[digits..].trim_start();
        }
    }
    line
}

/// Returns the number of an `M<digits>` line.
fn mcode(line: &str) -> Option<u32> {
    let rest = line.strip_prefix('M')?;
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Finds the numeric value of parameter `name` (for example `S200`).
fn param(line: &str, name: char) -> Option<f64> {
    // Skip the command word itself so `M140` is never read as a parameter.
    let args = line.split_once(char::is_whitespace).map_or("", |(_, args)| args);
    args.match_indices(name).find_map(|(idx, _)| {
        let value = &args[idx + name.len_utf8()..];
        let end = value
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(value.len());
        value[..end].parse().ok()
    })
}

// Fractional PWM values round to the nearest step.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pwm(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> LegacyCommand {
        LegacyCommand::parse(line).unwrap()
    }

    #[test]
    fn recognised_codes() {
        assert_eq!(parse("M105"), LegacyCommand::ReportTemperatures);
        assert_eq!(parse("M115"), LegacyCommand::FirmwareInfo);
        assert_eq!(parse("M104 S215"), LegacyCommand::SetHotendTemperature(215.0));
        assert_eq!(parse("M140 S60.5"), LegacyCommand::SetBedTemperature(60.5));
        assert_eq!(parse("M107"), LegacyCommand::FanOff);
        assert_eq!(parse("M24"), LegacyCommand::Resume);
        assert_eq!(parse("M25"), LegacyCommand::Pause);
        assert_eq!(parse("M27"), LegacyCommand::PrintStatus);
    }

    #[test]
    fn fan_speed_rescales_pwm() {
        assert_eq!(
            parse("M106 S128"),
            LegacyCommand::SetFanSpeed(Percent::new(50).unwrap())
        );
        assert_eq!(parse("M106"), LegacyCommand::SetFanSpeed(Percent::MAX));
        assert_eq!(parse("M106 S0"), LegacyCommand::SetFanSpeed(Percent::MIN));
        assert_eq!(parse("M106 S999"), LegacyCommand::SetFanSpeed(Percent::MAX));
        assert_eq!(
            parse("M106 P0 S64"),
            LegacyCommand::SetFanSpeed(Percent::new(25).unwrap())
        );
    }

    #[test]
    fn missing_temperature_defaults_to_zero() {
        assert_eq!(parse("M104"), LegacyCommand::SetHotendTemperature(0.0));
    }

    #[test]
    fn gcode_and_tool_lines_pass_through() {
        assert_eq!(parse("G28"), LegacyCommand::Gcode("G28".to_string()));
        assert_eq!(parse("T1"), LegacyCommand::Gcode("T1".to_string()));
    }

    #[test]
    fn unknown_mcode_is_raw() {
        assert_eq!(parse("M400"), LegacyCommand::Raw("M400".to_string()));
        assert_eq!(parse("M84 X"), LegacyCommand::Raw("M84 X".to_string()));
    }

    #[test]
    fn other_lines_are_ignored() {
        assert_eq!(parse("hello"), LegacyCommand::Ignored("hello".to_string()));
        assert_eq!(parse("M"), LegacyCommand::Ignored("M".to_string()));
        assert_eq!(LegacyCommand::parse(""), None);
        assert_eq!(LegacyCommand::parse("\r\n"), None);
    }

    #[test]
    fn strips_line_numbers_and_checksums() {
        assert_eq!(parse("N5 M110 N5*80"), LegacyCommand::Raw("M110 N5".to_string()));
        assert_eq!(parse("N1 M105*38\n"), LegacyCommand::ReportTemperatures);
    }

    #[test]
    fn maps_to_printer_commands() {
        assert_eq!(
            parse("M106 S128").to_printer_command(),
            Some(PrinterCommand::SetPartFan {
                speed: Percent::new(50).unwrap()
            })
        );
        assert_eq!(
            parse("M104 S210.9").to_printer_command(),
            Some(PrinterCommand::SetNozzleTemperature { celsius: 210 })
        );
        assert_eq!(
            parse("M107").to_printer_command(),
            Some(PrinterCommand::SetPartFan {
                speed: Percent::MIN
            })
        );
        assert_eq!(
            parse("M400").to_printer_command(),
            Some(PrinterCommand::SendGcode {
                gcode: "M400".to_string()
            })
        );
        assert_eq!(parse("M105").to_printer_command(), None);
        assert_eq!(parse("hello").to_printer_command(), None);
    }

    #[test]
    fn only_temperature_report_is_query() {
        assert!(parse("M105").is_query());
        assert!(!parse("M115").is_query());
        assert!(!parse("M24").is_query());
    }
}
