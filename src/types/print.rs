// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Print-job related argument types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Print speed profile.
///
/// # Examples
///
/// ```
/// use bambu_fleet::types::SpeedLevel;
///
/// let level: SpeedLevel = "sport".parse().unwrap();
/// assert_eq!(level, SpeedLevel::Sport);
/// assert_eq!(level.code(), 3);
/// assert_eq!(SpeedLevel::from_code(4).unwrap(), SpeedLevel::Ludicrous);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedLevel {
    /// 50% speed.
    Silent,
    /// 100% speed.
    Standard,
    /// 124% speed.
    Sport,
    /// 166% speed.
    Ludicrous,
}

impl SpeedLevel {
    /// Returns the numeric level the printer uses (1-4).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Silent => 1,
            Self::Standard => 2,
            Self::Sport => 3,
            Self::Ludicrous => 4,
        }
    }

    /// Creates a speed level from its numeric code.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if code is not 1-4.
    pub fn from_code(code: u8) -> Result<Self, ValueError> {
        match code {
            1 => Ok(Self::Silent),
            2 => Ok(Self::Standard),
            3 => Ok(Self::Sport),
            4 => Ok(Self::Ludicrous),
            other => Err(ValueError::OutOfRange {
                min: 1,
                max: 4,
                actual: u16::from(other),
            }),
        }
    }
}

impl FromStr for SpeedLevel {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.trim().parse::<u8>() {
            return Self::from_code(code);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "standard" => Ok(Self::Standard),
            "sport" => Ok(Self::Sport),
            "ludicrous" => Ok(Self::Ludicrous),
            _ => Err(ValueError::UnknownName {
                kind: "speed level",
                value: s.to_string(),
            }),
        }
    }
}

/// Build plate selection for a print job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlateType {
    /// Let the printer detect the plate.
    #[default]
    Auto,
    /// Cool plate.
    CoolPlate,
    /// Engineering plate.
    EngPlate,
    /// High temperature plate.
    HotPlate,
    /// Textured PEI plate.
    TexturedPlate,
}

impl PlateType {
    /// Returns the symbolic name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::CoolPlate => "COOL_PLATE",
            Self::EngPlate => "ENG_PLATE",
            Self::HotPlate => "HOT_PLATE",
            Self::TexturedPlate => "TEXTURED_PLATE",
        }
    }
}

impl fmt::Display for PlateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlateType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(Self::Auto),
            "COOL_PLATE" => Ok(Self::CoolPlate),
            "ENG_PLATE" => Ok(Self::EngPlate),
            "HOT_PLATE" => Ok(Self::HotPlate),
            "TEXTURED_PLATE" => Ok(Self::TexturedPlate),
            _ => Err(ValueError::UnknownName {
                kind: "plate type",
                value: s.to_string(),
            }),
        }
    }
}

/// Toggleable printer-side options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintOption {
    /// Resume automatically after a power loss or step loss.
    AutoRecovery,
    /// Pause when the filament tangles.
    FilamentTangleDetect,
    /// Printer sounds.
    SoundEnable,
    /// Switch to a matching spool when one runs out.
    AutoSwitchFilament,
}

impl PrintOption {
    /// Returns the symbolic name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AutoRecovery => "AUTO_RECOVERY",
            Self::FilamentTangleDetect => "FILAMENT_TANGLE_DETECT",
            Self::SoundEnable => "SOUND_ENABLE",
            Self::AutoSwitchFilament => "AUTO_SWITCH_FILAMENT",
        }
    }
}

impl fmt::Display for PrintOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintOption {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO_RECOVERY" => Ok(Self::AutoRecovery),
            "FILAMENT_TANGLE_DETECT" => Ok(Self::FilamentTangleDetect),
            "SOUND_ENABLE" => Ok(Self::SoundEnable),
            "AUTO_SWITCH_FILAMENT" => Ok(Self::AutoSwitchFilament),
            _ => Err(ValueError::UnknownName {
                kind: "print option",
                value: s.to_string(),
            }),
        }
    }
}
