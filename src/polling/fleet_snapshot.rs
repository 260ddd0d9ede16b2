// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Published fleet state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::record::DeviceRecord;
use crate::types::Serial;

/// Phase of the polling state machine.
///
/// `Idle → Polling → (Published | Degraded)`, then back to `Polling` on the
/// next tick. There is no terminal failure phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollPhase {
    /// No cycle has completed yet.
    #[default]
    Idle,
    /// A cycle is in progress.
    Polling,
    /// The last cycle published fresh data.
    Published,
    /// The last cycle failed; the previous data is republished.
    Degraded,
}

/// Immutable view of the fleet as of the last poll cycle.
///
/// Subscribers receive snapshots behind an `Arc` and never see a
/// half-updated mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetSnapshot {
    /// Records of every station from the last successful fetch.
    pub devices: BTreeMap<Serial, DeviceRecord>,
    /// Phase the cycle ended in.
    pub phase: PollPhase,
    /// Whether the last cycle fetched fresh data.
    ///
    /// Tells an empty fleet (`true`, no devices) apart from a failed fetch.
    pub last_fetch_succeeded: bool,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    /// When fresh data was last fetched.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Cause of the last failure, cleared on success.
    pub last_error: Option<String>,
}

impl FleetSnapshot {
    /// Returns the record of one station.
    #[must_use]
    pub fn device(&self, serial: &Serial) -> Option<&DeviceRecord> {
        self.devices.get(serial)
    }

    /// Returns `true` if the devices come from an earlier cycle than the
    /// last one.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.phase == PollPhase::Degraded
    }

    /// Builds the snapshot published after a successful fetch.
    pub(crate) fn published(devices: BTreeMap<Serial, DeviceRecord>) -> Self {
        Self {
            devices,
            phase: PollPhase::Published,
            last_fetch_succeeded: true,
            consecutive_failures: 0,
            refreshed_at: Some(Utc::now()),
            last_error: None,
        }
    }

    /// Builds the snapshot republished after a failed fetch.
    pub(crate) fn degraded(&self, error: String) -> Self {
        Self {
            devices: self.devices.clone(),
            phase: PollPhase::Degraded,
            last_fetch_succeeded: false,
            consecutive_failures: self.consecutive_failures.saturating_add(1),
            refreshed_at: self.refreshed_at,
            last_error: Some(error),
        }
    }
}
