// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process device link with simulated stations.
//!
//! [`MemoryLink`] behaves like a real link from the registry's point of view:
//! it must be started, it answers commands, and it mutates its simulated
//! stations in response. Failures and latency can be injected to exercise the
//! degraded paths.
//!
//! # Examples
//!
//! ```
//! use std::net::{IpAddr, Ipv4Addr};
//! use evse_sync::link::{DeviceIdentity, DeviceLink, LinkDevice, MemoryLink};
//! use evse_sync::types::Serial;
//!
//! # async fn example() -> Result<(), evse_sync::error::LinkError> {
//! let link = MemoryLink::new();
//! let serial = Serial::new("ABC123").unwrap();
//! let identity = DeviceIdentity::new(serial.clone(), IpAddr::V4(Ipv4Addr::LOCALHOST), 28376);
//! link.add_device(LinkDevice::new(identity), "123456");
//!
//! link.start().await?;
//! assert!(link.login(&serial, "123456").await?);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::LinkError;
use crate::types::{MetaState, Serial};

use super::{ChargeSession, DeviceLink, LinkDevice};

/// A command received by a [`MemoryLink`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// A login attempt.
    Login {
        /// Target station.
        serial: Serial,
    },
    /// A charge start.
    ChargeStart {
        /// Target station.
        serial: Serial,
        /// Requested current.
        amps: u8,
        /// Whether single-phase charging was requested.
        single_phase: bool,
    },
    /// A charge stop.
    ChargeStop {
        /// Target station.
        serial: Serial,
    },
    /// A current limit write.
    SetMaxElectricity {
        /// Target station.
        serial: Serial,
        /// New limit.
        amps: u8,
    },
    /// A name write.
    SetName {
        /// Target station.
        serial: Serial,
        /// New name.
        name: String,
    },
    /// A clock synchronisation.
    SyncTime {
        /// Target station.
        serial: Serial,
    },
}

struct SimulatedStation {
    device: LinkDevice,
    password: String,
}

#[derive(Default)]
struct MemoryLinkInner {
    stations: Mutex<HashMap<Serial, SimulatedStation>>,
    journal: Mutex<Vec<LinkCommand>>,
    started: AtomicBool,
    start_failure: Mutex<Option<LinkError>>,
    fetch_failure: Mutex<Option<LinkError>>,
    read_failure: Mutex<Option<LinkError>>,
    command_delay: Mutex<Duration>,
    reject_commands: AtomicBool,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
    session_counter: AtomicU32,
}

/// In-process [`DeviceLink`] backed by simulated stations.
///
/// Cloning is cheap and every clone shares the same stations.
#[derive(Clone, Default)]
pub struct MemoryLink {
    inner: Arc<MemoryLinkInner>,
}

impl MemoryLink {
    /// Creates an empty, stopped link.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a simulated station.
    pub fn add_device(&self, device: LinkDevice, password: impl Into<String>) {
        let station = SimulatedStation {
            device,
            password: password.into(),
        };
        self.inner
            .stations
            .lock()
            .insert(station.device.serial().clone(), station);
    }

    /// Mutates a simulated station in place.
    ///
    /// Returns `false` if the station does not exist.
    pub fn update_device(&self, serial: &Serial, update: impl FnOnce(&mut LinkDevice)) -> bool {
        match self.inner.stations.lock().get_mut(serial) {
            Some(station) => {
                update(&mut station.device);
                true
            }
            None => false,
        }
    }

    /// Makes the next [`start`](DeviceLink::start) calls fail with `error`.
    pub fn fail_start(&self, error: Option<LinkError>) {
        *self.inner.start_failure.lock() = error;
    }

    /// Makes [`all_devices`](DeviceLink::all_devices) fail with `error`.
    pub fn fail_fetch(&self, error: Option<LinkError>) {
        *self.inner.fetch_failure.lock() = error;
    }

    /// Makes single-station reads through [`device`](DeviceLink::device)
    /// fail with `error`. Commands keep working.
    pub fn fail_device_reads(&self, error: Option<LinkError>) {
        *self.inner.read_failure.lock() = error;
    }

    /// Delays every command and every full fetch by `delay`.
    pub fn set_command_delay(&self, delay: Duration) {
        *self.inner.command_delay.lock() = delay;
    }

    /// Makes stations answer every command with a refusal.
    pub fn reject_commands(&self, reject: bool) {
        self.inner.reject_commands.store(reject, Ordering::Release);
    }

    /// Returns every command received while started, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<LinkCommand> {
        self.inner.journal.lock().clone()
    }

    /// Returns how many times `start` was called.
    #[must_use]
    pub fn start_calls(&self) -> u32 {
        self.inner.start_calls.load(Ordering::Acquire)
    }

    /// Returns how many times `stop` was called while started.
    #[must_use]
    pub fn stop_calls(&self) -> u32 {
        self.inner.stop_calls.load(Ordering::Acquire)
    }

    async fn before_command(&self) -> Result<(), LinkError> {
        if !self.is_started() {
            return Err(LinkError::NotStarted);
        }
        let delay = *self.inner.command_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Runs `mutate` on the station if it exists and commands are accepted,
    /// then journals the command.
    fn apply(
        &self,
        command: LinkCommand,
        serial: &Serial,
        mutate: impl FnOnce(&mut SimulatedStation) -> bool,
    ) -> bool {
        let accepted = {
            let mut stations = self.inner.stations.lock();
            match stations.get_mut(serial) {
                Some(station) if !self.inner.reject_commands.load(Ordering::Acquire) => {
                    mutate(station)
                }
                _ => false,
            }
        };
        self.inner.journal.lock().push(command);
        accepted
    }

    fn next_session_id(&self) -> String {
        let id = self.inner.session_counter.fetch_add(1, Ordering::AcqRel) + 1;
        format!("{id:08}")
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("started", &self.is_started())
            .field("stations", &self.inner.stations.lock().len())
            .finish_non_exhaustive()
    }
}

impl DeviceLink for MemoryLink {
    async fn start(&self) -> Result<(), LinkError> {
        self.inner.start_calls.fetch_add(1, Ordering::AcqRel);
        if let Some(error) = self.inner.start_failure.lock().clone() {
            return Err(error);
        }
        self.inner.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn stop(&self) {
        if self.inner.started.swap(false, Ordering::AcqRel) {
            self.inner.stop_calls.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    async fn login(&self, serial: &Serial, password: &str) -> Result<bool, LinkError> {
        self.before_command().await?;
        let command = LinkCommand::Login {
            serial: serial.clone(),
        };
        Ok(self.apply(command, serial, |station| {
            if station.password != password {
                return false;
            }
            if let Some(snapshot) = station.device.snapshot.as_mut() {
                snapshot.logged_in = true;
                if snapshot.meta_state == MetaState::NotLoggedIn {
                    snapshot.meta_state = MetaState::Idle;
                }
            }
            true
        }))
    }

    async fn device(&self, serial: &Serial) -> Result<Option<LinkDevice>, LinkError> {
        if !self.is_started() {
            return Err(LinkError::NotStarted);
        }
        if let Some(error) = self.inner.read_failure.lock().clone() {
            return Err(error);
        }
        Ok(self
            .inner
            .stations
            .lock()
            .get(serial)
            .map(|station| station.device.clone()))
    }

    async fn all_devices(&self) -> Result<Vec<LinkDevice>, LinkError> {
        self.before_command().await?;
        if let Some(error) = self.inner.fetch_failure.lock().clone() {
            return Err(error);
        }
        Ok(self
            .inner
            .stations
            .lock()
            .values()
            .map(|station| station.device.clone())
            .collect())
    }

    async fn charge_start(
        &self,
        serial: &Serial,
        amps: u8,
        single_phase: bool,
    ) -> Result<bool, LinkError> {
        self.before_command().await?;
        let session_id = self.next_session_id();
        let command = LinkCommand::ChargeStart {
            serial: serial.clone(),
            amps,
            single_phase,
        };
        Ok(self.apply(command, serial, |station| {
            let Some(snapshot) = station.device.snapshot.as_mut() else {
                return false;
            };
            snapshot.meta_state = MetaState::Charging;
            snapshot.session = Some(ChargeSession {
                charge_id: session_id,
                start_date: Some(Utc::now()),
                current_state: 1,
                ..ChargeSession::default()
            });
            true
        }))
    }

    async fn charge_stop(&self, serial: &Serial) -> Result<bool, LinkError> {
        self.before_command().await?;
        let command = LinkCommand::ChargeStop {
            serial: serial.clone(),
        };
        Ok(self.apply(command, serial, |station| {
            if let Some(snapshot) = station.device.snapshot.as_mut() {
                if snapshot.meta_state.is_charging() {
                    snapshot.meta_state = MetaState::Finished;
                }
                snapshot.session = None;
            }
            true
        }))
    }

    async fn set_max_electricity(&self, serial: &Serial, amps: u8) -> Result<bool, LinkError> {
        self.before_command().await?;
        let command = LinkCommand::SetMaxElectricity {
            serial: serial.clone(),
            amps,
        };
        Ok(self.apply(command, serial, |station| {
            station.device.settings.max_electricity = amps;
            true
        }))
    }

    async fn set_name(&self, serial: &Serial, name: &str) -> Result<bool, LinkError> {
        self.before_command().await?;
        let command = LinkCommand::SetName {
            serial: serial.clone(),
            name: name.to_string(),
        };
        Ok(self.apply(command, serial, |station| {
            station.device.settings.name = Some(name.to_string());
            true
        }))
    }

    async fn sync_time(&self, serial: &Serial) -> Result<bool, LinkError> {
        self.before_command().await?;
        let command = LinkCommand::SyncTime {
            serial: serial.clone(),
        };
        Ok(self.apply(command, serial, |station| {
            if let Some(snapshot) = station.device.snapshot.as_mut() {
                snapshot.last_seen = Utc::now();
            }
            true
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DeviceIdentity, DeviceSnapshot};
    use std::net::{IpAddr, Ipv4Addr};

    fn serial() -> Serial {
        Serial::new("ABC123").unwrap()
    }

    fn station(state: MetaState) -> LinkDevice {
        let identity = DeviceIdentity::new(serial(), IpAddr::V4(Ipv4Addr::LOCALHOST), 28376);
        let mut device = LinkDevice::new(identity);
        device.snapshot = Some(DeviceSnapshot::online(state));
        device
    }

    #[tokio::test]
    async fn commands_require_started_link() {
        let link = MemoryLink::new();
        link.add_device(station(MetaState::Idle), "pw");

        assert_eq!(
            link.charge_start(&serial(), 16, false).await,
            Err(LinkError::NotStarted)
        );
        assert!(link.commands().is_empty());
    }

    #[tokio::test]
    async fn login_checks_password() {
        let link = MemoryLink::new();
        link.add_device(station(MetaState::NotLoggedIn), "pw");
        link.start().await.unwrap();

        assert!(!link.login(&serial(), "wrong").await.unwrap());
        assert!(link.login(&serial(), "pw").await.unwrap());

        let device = link.device(&serial()).await.unwrap().unwrap();
        assert_eq!(device.meta_state(), MetaState::Idle);
        assert!(device.snapshot.unwrap().logged_in);
    }

    #[tokio::test]
    async fn start_then_stop_moves_through_charging() {
        let link = MemoryLink::new();
        link.add_device(station(MetaState::Plugged), "pw");
        link.start().await.unwrap();

        assert!(link.charge_start(&serial(), 16, false).await.unwrap());
        let device = link.device(&serial()).await.unwrap().unwrap();
        assert!(device.is_charging());
        assert!(device.snapshot.unwrap().session.is_some());

        assert!(link.charge_stop(&serial()).await.unwrap());
        let device = link.device(&serial()).await.unwrap().unwrap();
        assert_eq!(device.meta_state(), MetaState::Finished);
        assert!(device.snapshot.unwrap().session.is_none());
    }

    #[tokio::test]
    async fn unknown_station_declines() {
        let link = MemoryLink::new();
        link.start().await.unwrap();

        assert!(!link.sync_time(&serial()).await.unwrap());
        assert_eq!(link.commands().len(), 1);
    }

    #[tokio::test]
    async fn rejected_commands_leave_state_alone() {
        let link = MemoryLink::new();
        link.add_device(station(MetaState::Idle), "pw");
        link.start().await.unwrap();
        link.reject_commands(true);

        assert!(!link.set_max_electricity(&serial(), 10).await.unwrap());
        let device = link.device(&serial()).await.unwrap().unwrap();
        assert_eq!(device.settings.max_electricity, 0);
    }

    #[tokio::test]
    async fn fetch_failure_is_injected() {
        let link = MemoryLink::new();
        link.start().await.unwrap();
        link.fail_fetch(Some(LinkError::Timeout(500)));

        assert_eq!(link.all_devices().await, Err(LinkError::Timeout(500)));

        link.fail_fetch(None);
        assert!(link.all_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_failure_spares_commands() {
        let link = MemoryLink::new();
        link.add_device(station(MetaState::Charging), "pw");
        link.start().await.unwrap();
        link.fail_device_reads(Some(LinkError::Protocol("bad frame".to_string())));

        assert!(link.device(&serial()).await.is_err());
        assert!(link.charge_stop(&serial()).await.unwrap());
        assert_eq!(link.all_devices().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let link = MemoryLink::new();
        link.start().await.unwrap();

        link.stop().await;
        link.stop().await;

        assert!(!link.is_started());
        assert_eq!(link.stop_calls(), 1);
    }
}
