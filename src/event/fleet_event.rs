// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet event types.

use std::time::Duration;

use crate::types::{ProtectionMinutes, Serial};

/// Events emitted by the registry and the polling coordinator.
///
/// Station-scoped events carry the serial of the station they concern;
/// poll events describe the whole fleet.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use evse_sync::event::FleetEvent;
/// use evse_sync::types::Serial;
///
/// let serial = Serial::new("ABC123").unwrap();
/// let blocked = FleetEvent::start_blocked(serial.clone(), Duration::from_secs(30));
///
/// assert_eq!(blocked.serial(), Some(&serial));
/// assert!(blocked.is_charge_control());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetEvent {
    /// The link reported a station for the first time.
    DeviceDiscovered {
        /// The new station.
        serial: Serial,
    },

    /// A charge start was acknowledged by the station.
    ChargeStarted {
        /// The station.
        serial: Serial,
        /// Current sent with the start command.
        amps: u8,
        /// Whether single-phase charging was requested.
        single_phase: bool,
    },

    /// A charge stop was acknowledged by the station.
    ChargeStopped {
        /// The station.
        serial: Serial,
        /// Whether the stop ended an active charge and armed start protection.
        cooldown_armed: bool,
    },

    /// A charge start was refused by start protection.
    StartBlocked {
        /// The station.
        serial: Serial,
        /// Time left before a start is allowed.
        remaining: Duration,
    },

    /// The start protection window of a station was changed.
    ProtectionChanged {
        /// The station.
        serial: Serial,
        /// New window.
        protection: ProtectionMinutes,
    },

    /// A poll cycle published fresh data.
    PollSucceeded {
        /// Number of stations in the published mapping.
        devices: usize,
    },

    /// A poll cycle failed and the previous data was kept.
    PollFailed {
        /// Failure description.
        error: String,
        /// Failed cycles since the last success.
        consecutive_failures: u32,
    },
}

impl FleetEvent {
    /// Returns the station this event concerns, if any.
    #[must_use]
    pub fn serial(&self) -> Option<&Serial> {
        match self {
            Self::DeviceDiscovered { serial }
            | Self::ChargeStarted { serial, .. }
            | Self::ChargeStopped { serial, .. }
            | Self::StartBlocked { serial, .. }
            | Self::ProtectionChanged { serial, .. } => Some(serial),
            Self::PollSucceeded { .. } | Self::PollFailed { .. } => None,
        }
    }

    /// Returns `true` for start, stop and blocked-start events.
    #[must_use]
    pub fn is_charge_control(&self) -> bool {
        matches!(
            self,
            Self::ChargeStarted { .. } | Self::ChargeStopped { .. } | Self::StartBlocked { .. }
        )
    }

    /// Returns `true` for poll cycle events.
    #[must_use]
    pub fn is_poll(&self) -> bool {
        matches!(self, Self::PollSucceeded { .. } | Self::PollFailed { .. })
    }

    /// Creates a device discovered event.
    #[must_use]
    pub fn device_discovered(serial: Serial) -> Self {
        Self::DeviceDiscovered { serial }
    }

    /// Creates a start blocked event.
    #[must_use]
    pub fn start_blocked(serial: Serial, remaining: Duration) -> Self {
        Self::StartBlocked { serial, remaining }
    }

    /// Creates a poll failed event.
    #[must_use]
    pub fn poll_failed(error: impl Into<String>, consecutive_failures: u32) -> Self {
        Self::PollFailed {
            error: error.into(),
            consecutive_failures,
        }
    }
}
