// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device serial type.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ValueError;

/// Stable identifier of one charging station.
///
/// The serial is an opaque string reported by the station itself. It is
/// compared case-sensitively and never normalised: `"abc"` and `"ABC"` are two
/// different devices.
///
/// Cloning is cheap (the string is reference-counted).
///
/// # Examples
///
/// ```
/// use evse_sync::types::Serial;
///
/// let serial = Serial::new("ABC123").unwrap();
/// assert_eq!(serial.as_str(), "ABC123");
/// assert_ne!(serial, Serial::new("abc123").unwrap());
///
/// assert!(Serial::new("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(Arc<str>);

impl Serial {
    /// Creates a serial from a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptySerial` if the string is empty.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValueError> {
        let value = value.as_ref();
        if value.is_empty() {
            return Err(ValueError::EmptySerial);
        }
        Ok(Self(Arc::from(value)))
    }

    /// Returns the serial as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serial({})", self.0)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Serial {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Serial {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Serial> for String {
    fn from(serial: Serial) -> Self {
        serial.0.to_string()
    }
}

impl AsRef<str> for Serial {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Serial {
    fn borrow(&self) -> &str {
        &self.0
    }
}
