// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operational labels for charging stations.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// Derived operational state of a station.
///
/// The label is computed by the device link from the raw protocol fields (gun
/// state, output state, error bits, login status). This library treats it as
/// opaque input; in particular it never tries to infer [`MetaState::Charging`]
/// on its own.
///
/// # Examples
///
/// ```
/// use evse_sync::types::MetaState;
///
/// assert_eq!(MetaState::Charging.as_str(), "CHARGING");
/// assert_eq!("not_logged_in".parse::<MetaState>().unwrap(), MetaState::NotLoggedIn);
/// assert!(MetaState::Charging.is_charging());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaState {
    /// No recent datagram from the station.
    #[default]
    Offline,
    /// Station is reachable but no session is logged in.
    NotLoggedIn,
    /// No vehicle connected.
    Idle,
    /// A vehicle is plugged in but not charging.
    Plugged,
    /// Charging was requested and the station is waiting for the vehicle.
    Waiting,
    /// Energy is being delivered.
    Charging,
    /// The last session ended and the vehicle is still plugged in.
    Finished,
    /// The station reports a fault.
    Error,
}

impl MetaState {
    /// Returns the upper-case label published in device records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "OFFLINE",
            Self::NotLoggedIn => "NOT_LOGGED_IN",
            Self::Idle => "IDLE",
            Self::Plugged => "PLUGGED",
            Self::Waiting => "WAITING",
            Self::Charging => "CHARGING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }

    /// Returns `true` for the active-charging state.
    #[must_use]
    pub const fn is_charging(&self) -> bool {
        matches!(self, Self::Charging)
    }
}

impl fmt::Display for MetaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetaState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OFFLINE" => Ok(Self::Offline),
            "NOT_LOGGED_IN" => Ok(Self::NotLoggedIn),
            "IDLE" => Ok(Self::Idle),
            "PLUGGED" | "PLUGGED_IN" => Ok(Self::Plugged),
            "WAITING" => Ok(Self::Waiting),
            "CHARGING" => Ok(Self::Charging),
            "FINISHED" => Ok(Self::Finished),
            "ERROR" | "FAULT" => Ok(Self::Error),
            _ => Err(ValueError::InvalidMetaState(s.to_string())),
        }
    }
}
