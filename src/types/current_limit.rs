// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Charging current limit type.
//!
//! This module provides a type-safe representation of the maximum charging
//! current, ensuring values are always within the range the stations accept
//! (6 to 32 amperes, in steps of 1).

use std::fmt;

use crate::error::ValueError;

/// Maximum charging current in amperes (6-32).
///
/// 6 A is the lowest current the IEC 61851 pilot signal can advertise; 32 A is
/// the highest rating of the supported stations.
///
/// # Examples
///
/// ```
/// use evse_sync::types::CurrentLimit;
///
/// let limit = CurrentLimit::new(16).unwrap();
/// assert_eq!(limit.amps(), 16);
///
/// assert_eq!(CurrentLimit::MIN.amps(), 6);
/// assert_eq!(CurrentLimit::MAX.amps(), 32);
///
/// assert!(CurrentLimit::new(5).is_err());
/// assert!(CurrentLimit::new(33).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct CurrentLimit(u8);

impl CurrentLimit {
    /// Lowest accepted limit (6 A).
    pub const MIN: Self = Self(6);

    /// Highest accepted limit (32 A).
    pub const MAX: Self = Self(32);

    /// Creates a new current limit.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `amps` is outside [6, 32].
    pub fn new(amps: u8) -> Result<Self, ValueError> {
        if !(Self::MIN.0..=Self::MAX.0).contains(&amps) {
            return Err(ValueError::OutOfRange {
                min: u16::from(Self::MIN.0),
                max: u16::from(Self::MAX.0),
                actual: u16::from(amps),
            });
        }
        Ok(Self(amps))
    }

    /// Creates a current limit, clamping to the valid range.
    ///
    /// # Examples
    ///
    /// ```
    /// use evse_sync::types::CurrentLimit;
    ///
    /// assert_eq!(CurrentLimit::clamped(0).amps(), 6);
    /// assert_eq!(CurrentLimit::clamped(40).amps(), 32);
    /// ```
    #[must_use]
    pub const fn clamped(amps: u8) -> Self {
        if amps < Self::MIN.0 {
            Self::MIN
        } else if amps > Self::MAX.0 {
            Self::MAX
        } else {
            Self(amps)
        }
    }

    /// Returns the limit in amperes.
    #[must_use]
    pub const fn amps(&self) -> u8 {
        self.0
    }
}

impl Default for CurrentLimit {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for CurrentLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} A", self.0)
    }
}

impl TryFrom<u8> for CurrentLimit {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CurrentLimit> for u8 {
    fn from(limit: CurrentLimit) -> Self {
        limit.0
    }
}
