// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic refresh of the fleet.
//!
//! The [`PollingCoordinator`] runs one poll cycle per interval and publishes
//! the result as an immutable [`FleetSnapshot`] on a watch channel. Failed
//! cycles republish the last good data instead of clearing it.

mod coordinator;
mod fleet_snapshot;
mod polling_config;

pub use coordinator::PollingCoordinator;
pub use fleet_snapshot::{FleetSnapshot, PollPhase};
pub use polling_config::{DEFAULT_POLL_INTERVAL, PollingConfig};
