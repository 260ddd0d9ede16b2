// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `evse_sync` library.
//!
//! This module provides the error hierarchy used across the library: value
//! validation, failures reported by the device link, and the registry-level
//! outcomes (unknown device, active protection, timeouts).
//!
//! Most registry operations also exist in a `bool`/`Option` flavour that
//! collapses these errors into a failure value, so callers that only care
//! about success never have to match on them.

use std::time::Duration;

use thiserror::Error;

use crate::types::Serial;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The identifier is not known to the device link.
    #[error("device {0} not found")]
    DeviceUnknown(Serial),

    /// The device link is not started or could not be reached.
    #[error("device link unavailable: {0}")]
    LinkUnavailable(String),

    /// A charge start was refused because the anti-wear cooldown is running.
    #[error("start protection active for {serial}: {} s remaining", remaining.as_secs())]
    ProtectionActive {
        /// The device the start was requested for.
        serial: Serial,
        /// Time left before a start is allowed again.
        remaining: Duration,
    },

    /// Fetching the device set failed during a poll.
    #[error("device fetch failed: {0}")]
    TransientFetchFailure(#[source] LinkError),

    /// A forwarded command failed inside the device link.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// The device answered but declined the command.
    #[error("{operation} rejected by device {serial}")]
    Rejected {
        /// The device that rejected the command.
        serial: Serial,
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// A forwarded call did not complete in time.
    #[error("{operation} timed out after {} ms", timeout.as_millis())]
    Timeout {
        /// Name of the operation that timed out.
        operation: &'static str,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

impl Error {
    /// Returns `true` if the error means the device is not known.
    #[must_use]
    pub fn is_device_unknown(&self) -> bool {
        matches!(self, Self::DeviceUnknown(_))
    }

    /// Returns `true` if the error is a refused start due to cooldown.
    #[must_use]
    pub fn is_protection_active(&self) -> bool {
        matches!(self, Self::ProtectionActive { .. })
    }
}

/// Errors reported by a [`DeviceLink`](crate::link::DeviceLink) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The link has not been started yet.
    #[error("link is not started")]
    NotStarted,

    /// The underlying transport could not be opened or was lost.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The device did not answer in time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The device sent something the link could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors related to value validation and constraints.
///
/// These errors occur when attempting to create constrained types
/// with invalid values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// A device serial was empty.
    #[error("device serial must not be empty")]
    EmptySerial,

    /// An unrecognised operational state label.
    #[error("invalid meta state: {0}")]
    InvalidMetaState(String),

    /// An unrecognised temperature unit string.
    #[error("invalid temperature unit: {0}")]
    InvalidTemperatureUnit(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 6,
            max: 32,
            actual: 40,
        };
        assert_eq!(err.to_string(), "value 40 is out of range [6, 32]");
    }

    #[test]
    fn error_from_link_error() {
        let err: Error = LinkError::NotStarted.into();
        assert!(matches!(err, Error::Link(LinkError::NotStarted)));
    }

    #[test]
    fn protection_active_display() {
        let err = Error::ProtectionActive {
            serial: Serial::new("ABC123").unwrap(),
            remaining: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "start protection active for ABC123: 30 s remaining"
        );
        assert!(err.is_protection_active());
        assert!(!err.is_device_unknown());
    }

    #[test]
    fn timeout_display() {
        let err = Error::Timeout {
            operation: "charge_stop",
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "charge_stop timed out after 1500 ms");
    }

    #[test]
    fn device_unknown_display() {
        let err = Error::DeviceUnknown(Serial::new("XYZ").unwrap());
        assert_eq!(err.to_string(), "device XYZ not found");
        assert!(err.is_device_unknown());
    }
}
