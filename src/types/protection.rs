// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anti-wear protection window type.
//!
//! Use [`ProtectionMinutes`] with
//! [`DeviceRegistry::set_protection_minutes()`](crate::manager::DeviceRegistry::set_protection_minutes)
//! to configure how long a station must stay stopped before a new charge may
//! be started.

use std::fmt;
use std::time::Duration;

use crate::error::ValueError;

/// Minimum dwell time after a stop, in whole minutes (0-60).
///
/// - 0 = protection disabled
/// - 1 = default, prevents instantaneous re-cycling while staying responsive
/// - 60 = longest window
///
/// # Examples
///
/// ```
/// use evse_sync::types::ProtectionMinutes;
/// use std::time::Duration;
///
/// let window = ProtectionMinutes::new(5).unwrap();
/// assert_eq!(window.as_duration(), Duration::from_secs(300));
///
/// assert!(ProtectionMinutes::DISABLED.is_disabled());
/// assert_eq!(ProtectionMinutes::default().value(), 1);
/// assert!(ProtectionMinutes::new(61).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct ProtectionMinutes(u8);

impl ProtectionMinutes {
    /// Largest accepted window.
    pub const MAX: u8 = 60;

    /// No protection: starts are always allowed.
    pub const DISABLED: Self = Self(0);

    /// Default window applied to devices never configured explicitly.
    pub const DEFAULT: Self = Self(1);

    /// Creates a new protection window.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `minutes` exceeds 60.
    pub fn new(minutes: u8) -> Result<Self, ValueError> {
        if minutes > Self::MAX {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: u16::from(Self::MAX),
                actual: u16::from(minutes),
            });
        }
        Ok(Self(minutes))
    }

    /// Returns the window in minutes.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns `true` when protection is switched off.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.0 == 0
    }

    /// Returns the window as a [`Duration`].
    #[must_use]
    #[allow(clippy::cast_lossless)] // u64::from is not const
    pub const fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0 as u64 * 60)
    }
}

impl Default for ProtectionMinutes {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ProtectionMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

impl TryFrom<u8> for ProtectionMinutes {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProtectionMinutes> for u8 {
    fn from(minutes: ProtectionMinutes) -> Self {
        minutes.0
    }
}
