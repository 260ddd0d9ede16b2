// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flat published record of a station.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::link::{DeviceIdentity, DeviceSettings, DeviceSnapshot, LinkDevice};
use crate::types::{CurrentLimit, MetaState, Serial, TemperatureUnit};

/// Display name used when the station has none configured.
pub const DEFAULT_DEVICE_NAME: &str = "EVSEMaster";

/// Externally published view of one station.
///
/// Every field is always present. When the station has not reported yet, or
/// no session is active, the affected fields hold zero, empty or `None`
/// values instead of being left out, so consumers never have to check for
/// missing keys. Serialised field names are part of the public contract.
///
/// # Examples
///
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
///
/// use evse_sync::link::{DeviceIdentity, DeviceSettings};
/// use evse_sync::record::project;
/// use evse_sync::types::Serial;
///
/// let identity = DeviceIdentity::new(
///     Serial::new("ABC123").unwrap(),
///     IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)),
///     28376,
/// );
/// let record = project(&identity, None, &DeviceSettings::default());
///
/// assert_eq!(record.name, "EVSEMaster");
/// assert_eq!(record.charge_id, "");
/// assert!(record.errors.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Station serial.
    pub serial: Serial,
    /// Station address.
    pub ip: IpAddr,
    /// Station port.
    pub port: u16,
    /// When the station was last heard from.
    pub last_seen: Option<DateTime<Utc>>,
    /// Whether the station is reachable.
    pub online: bool,
    /// Whether a login session is active.
    pub logged_in: bool,
    /// Operational label.
    pub state: MetaState,

    /// Manufacturer name reported by the station.
    pub brand: String,
    /// Model name reported by the station.
    pub model: String,
    /// Hardware revision.
    pub hardware_version: String,
    /// Firmware version.
    pub software_version: String,
    /// Rated power in watts.
    pub max_power: u32,
    /// Advertised current ceiling in amperes.
    pub max_electricity: u8,
    /// Number of supply phases.
    pub phases: u8,

    /// Display name, [`DEFAULT_DEVICE_NAME`] when unset.
    pub name: String,
    /// Current limit stored on the station, 0 when not yet read.
    pub configured_max_electricity: u8,
    /// Unit of the temperature readings.
    pub temperature_unit: TemperatureUnit,

    /// Instantaneous output power in watts.
    pub current_power: f64,
    /// Voltage on phase L1 in volts.
    pub voltage_l1: f64,
    /// Voltage on phase L2 in volts.
    pub voltage_l2: f64,
    /// Voltage on phase L3 in volts.
    pub voltage_l3: f64,
    /// Current on phase L1 in amperes.
    pub current_l1: f64,
    /// Current on phase L2 in amperes.
    pub current_l2: f64,
    /// Current on phase L3 in amperes.
    pub current_l3: f64,
    /// Internal temperature, in [`temperature_unit`](Self::temperature_unit).
    pub temperature_inner: f64,
    /// External temperature, in [`temperature_unit`](Self::temperature_unit).
    pub temperature_outer: f64,
    /// Raw connector state code.
    pub gun_state: u8,
    /// Raw output relay state code.
    pub output_state: u8,
    /// Active fault labels, empty when healthy.
    pub errors: Vec<String>,

    /// Energy delivered in the active session, in kWh.
    pub charge_kwh: f64,
    /// Active session identifier, empty without a session.
    pub charge_id: String,
    /// Start of the active session.
    pub start_date: Option<DateTime<Utc>>,
    /// Elapsed session time in seconds, 0 without a session.
    pub duration_seconds: u64,
    /// Raw session state code, 0 without a session.
    pub charge_state: u8,
}

/// Projects a station's attributes onto a [`DeviceRecord`].
///
/// Pure and total: a missing snapshot yields the default block for every
/// snapshot-derived field, with `state` set to [`MetaState::Offline`].
#[must_use]
pub fn project(
    identity: &DeviceIdentity,
    snapshot: Option<&DeviceSnapshot>,
    settings: &DeviceSettings,
) -> DeviceRecord {
    let readings = snapshot.and_then(|s| s.readings.clone()).unwrap_or_default();
    let session = snapshot.and_then(|s| s.session.clone()).unwrap_or_default();
    let info = snapshot.map(|s| s.info.clone()).unwrap_or_default();

    DeviceRecord {
        serial: identity.serial.clone(),
        ip: identity.ip,
        port: identity.port,
        last_seen: snapshot.map(|s| s.last_seen),
        online: snapshot.is_some_and(|s| s.online),
        logged_in: snapshot.is_some_and(|s| s.logged_in),
        state: snapshot.map_or(MetaState::Offline, |s| s.meta_state),

        brand: info.brand,
        model: info.model,
        hardware_version: info.hardware_version,
        software_version: info.software_version,
        max_power: info.max_power,
        max_electricity: info.max_electricity,
        phases: info.phases,

        name: settings
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DEVICE_NAME)
            .to_owned(),
        configured_max_electricity: settings.max_electricity,
        temperature_unit: settings.temperature_unit,

        current_power: readings.current_power,
        voltage_l1: readings.l1_voltage,
        voltage_l2: readings.l2_voltage,
        voltage_l3: readings.l3_voltage,
        current_l1: readings.l1_electricity,
        current_l2: readings.l2_electricity,
        current_l3: readings.l3_electricity,
        temperature_inner: readings.inner_temp,
        temperature_outer: readings.outer_temp,
        gun_state: readings.gun_state,
        output_state: readings.output_state,
        errors: readings.errors,

        charge_kwh: session.charge_kwh,
        charge_id: session.charge_id,
        start_date: session.start_date,
        duration_seconds: session.duration_seconds,
        charge_state: session.current_state,
    }
}

impl DeviceRecord {
    /// Projects everything a link knows about a station.
    #[must_use]
    pub fn from_device(device: &LinkDevice) -> Self {
        project(&device.identity, device.snapshot.as_ref(), &device.settings)
    }

    /// Returns the record as a flat JSON object keyed by field name.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Returns `true` if the station accepts configuration commands.
    #[must_use]
    pub fn controls_available(&self) -> bool {
        self.online && self.logged_in
    }

    /// Returns `true` if start protection can be configured for the station.
    #[must_use]
    pub fn protection_available(&self) -> bool {
        self.online
    }

    /// Current limit to display, the lower bound when not yet read.
    #[must_use]
    pub fn current_limit_value(&self) -> u8 {
        if self.configured_max_electricity > 0 {
            self.configured_max_electricity
        } else {
            CurrentLimit::MIN.amps()
        }
    }

    /// Returns `true` if the station reported an active charge.
    #[must_use]
    pub fn is_charging(&self) -> bool {
        self.state.is_charging()
    }
}
