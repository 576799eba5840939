// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Percentage type for fan speed targets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A percentage (0-100), used for fan speed targets.
///
/// # Examples
///
/// ```
/// use bambu_fleet::types::Percent;
///
/// let half = Percent::new(50).unwrap();
/// assert_eq!(half.value(), 50);
///
/// assert!(Percent::new(101).is_err());
/// assert_eq!(Percent::from_pwm(128).value(), 50);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percent(u8);

impl Percent {
    /// 0%.
    pub const MIN: Self = Self(0);

    /// 100%.
    pub const MAX: Self = Self(100);

    /// Creates a percentage.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Creates a percentage, clamping values above 100.
    #[must_use]
    pub const fn clamped(value: u8) -> Self {
        if value > 100 { Self(100) } else { Self(value) }
    }

    /// Converts an 8-bit PWM duty value (0-255) to the nearest percentage.
    ///
    /// This is the rescale applied to `M106 S<pwm>` fan commands.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_pwm(pwm: u8) -> Self {
        // (pwm * 100 + 127) / 255 rounds half up; the result is at most 100
        let scaled = (u16::from(pwm) * 100 + 127) / 255;
        Self(scaled as u8)
    }

    /// Returns the percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for Percent {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percent> for u8 {
    fn from(value: Percent) -> Self {
        value.0
    }
}
