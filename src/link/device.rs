// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device attributes as reported by a device link.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MetaState, Serial, TemperatureUnit};

/// Network identity of a station. Read-only to this library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Station serial.
    pub serial: Serial,
    /// Address the station answers from.
    pub ip: IpAddr,
    /// UDP port the station answers from.
    pub port: u16,
}

impl DeviceIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(serial: Serial, ip: IpAddr, port: u16) -> Self {
        Self { serial, ip, port }
    }
}

/// Static description announced by the station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Manufacturer label.
    pub brand: String,
    /// Model label.
    pub model: String,
    /// Hardware revision.
    pub hardware_version: String,
    /// Firmware revision.
    pub software_version: String,
    /// Rated power in watts.
    pub max_power: u32,
    /// Rated current ceiling in amperes, 0 when not yet read.
    pub max_electricity: u8,
    /// Number of supply phases.
    pub phases: u8,
}

/// Configuration block stored on the station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// User-assigned name, if any.
    pub name: Option<String>,
    /// Configured current limit in amperes, 0 when not yet read.
    pub max_electricity: u8,
    /// Unit used for temperature readings.
    pub temperature_unit: TemperatureUnit,
}

/// Electrical and thermal readings from the last status datagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectricalReadings {
    /// Power currently delivered, in watts.
    pub current_power: f64,
    /// Phase L1 voltage.
    pub l1_voltage: f64,
    /// Phase L2 voltage.
    pub l2_voltage: f64,
    /// Phase L3 voltage.
    pub l3_voltage: f64,
    /// Phase L1 current.
    pub l1_electricity: f64,
    /// Phase L2 current.
    pub l2_electricity: f64,
    /// Phase L3 current.
    pub l3_electricity: f64,
    /// Internal temperature.
    pub inner_temp: f64,
    /// External temperature.
    pub outer_temp: f64,
    /// Raw connector (gun) state code.
    pub gun_state: u8,
    /// Raw output relay state code.
    pub output_state: u8,
    /// Active fault labels.
    pub errors: Vec<String>,
}

/// Attributes of the charging session in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargeSession {
    /// Energy delivered so far, in kWh.
    pub charge_kwh: f64,
    /// Session identifier assigned by the station.
    pub charge_id: String,
    /// When the session started.
    pub start_date: Option<DateTime<Utc>>,
    /// Elapsed session time.
    pub duration_seconds: u64,
    /// Raw session state code.
    pub current_state: u8,
}

/// Point-in-time view of a station.
///
/// A snapshot is produced fresh by the link on every fetch and replaced as a
/// whole; nothing in this library mutates one after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// When the station was last heard from.
    pub last_seen: DateTime<Utc>,
    /// Whether the station is currently reachable.
    pub online: bool,
    /// Whether a login session is active.
    pub logged_in: bool,
    /// Derived operational label.
    pub meta_state: MetaState,
    /// Static description.
    pub info: DeviceInfo,
    /// Latest readings, if a status datagram has been received.
    pub readings: Option<ElectricalReadings>,
    /// Active session, if any.
    pub session: Option<ChargeSession>,
}

impl DeviceSnapshot {
    /// Creates a snapshot of a reachable station in `meta_state`, seen now.
    #[must_use]
    pub fn online(meta_state: MetaState) -> Self {
        Self {
            last_seen: Utc::now(),
            online: true,
            logged_in: !matches!(meta_state, MetaState::NotLoggedIn | MetaState::Offline),
            meta_state,
            ..Self::default()
        }
    }
}

/// Everything a link knows about one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDevice {
    /// Network identity.
    pub identity: DeviceIdentity,
    /// Configuration block.
    pub settings: DeviceSettings,
    /// Latest snapshot, absent until the station has reported once.
    pub snapshot: Option<DeviceSnapshot>,
}

impl LinkDevice {
    /// Creates a device with no snapshot yet.
    #[must_use]
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            settings: DeviceSettings::default(),
            snapshot: None,
        }
    }

    /// Returns the station serial.
    #[must_use]
    pub fn serial(&self) -> &Serial {
        &self.identity.serial
    }

    /// Returns the operational label, [`MetaState::Offline`] without a snapshot.
    #[must_use]
    pub fn meta_state(&self) -> MetaState {
        self.snapshot
            .as_ref()
            .map_or(MetaState::Offline, |s| s.meta_state)
    }

    /// Returns `true` if the latest snapshot says the station is charging.
    #[must_use]
    pub fn is_charging(&self) -> bool {
        self.meta_state().is_charging()
    }

    /// Returns the advertised current ceiling, 0 when unknown.
    #[must_use]
    pub fn advertised_max_electricity(&self) -> u8 {
        self.snapshot.as_ref().map_or(0, |s| s.info.max_electricity)
    }
}
