// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device registry routing commands to the device link.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::charge::{ChargeGuard, GuardState, resolve_amperage};
use crate::error::{Error, LinkError, Result};
use crate::event::{EventBus, FleetEvent};
use crate::link::{DeviceLink, LinkDevice};
use crate::record::DeviceRecord;
use crate::types::{CurrentLimit, ProtectionMinutes, Serial};

use super::registry_config::RegistryConfig;

/// Per-station registry entry.
#[derive(Debug)]
struct RegistryEntry {
    /// Serialises start, stop and protection changes for one station.
    command_lock: tokio::sync::Mutex<()>,
    /// When the link first reported the station.
    discovered_at: DateTime<Utc>,
}

#[derive(Debug)]
struct RegistryInner<L> {
    link: L,
    config: RegistryConfig,
    entries: RwLock<HashMap<Serial, Arc<RegistryEntry>>>,
    guard: ChargeGuard,
    event_bus: EventBus,
}

/// Routes operations to stations by serial.
///
/// The registry owns the device link, the [`ChargeGuard`] and the event
/// bus. It is created once per process and shared by cloning; every clone
/// refers to the same state.
///
/// Each operation exists in two flavours:
///
/// - `try_*` returns a [`Result`] describing why the operation failed;
/// - the plain flavour collapses failures into `false` or `None` and logs
///   the cause. An unknown serial is reported exactly like an unreachable
///   station.
///
/// Forwarded link calls are bounded by
/// [`RegistryConfig::command_timeout`]. A call that times out reports
/// failure and commits nothing; in particular it never arms start
/// protection.
///
/// # Examples
///
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
///
/// use evse_sync::link::{DeviceIdentity, DeviceLink, DeviceSnapshot, LinkDevice, MemoryLink};
/// use evse_sync::manager::DeviceRegistry;
/// use evse_sync::types::{MetaState, Serial};
///
/// # async fn example() -> evse_sync::Result<()> {
/// let link = MemoryLink::new();
/// let serial = Serial::new("ABC123")?;
/// let mut station = LinkDevice::new(DeviceIdentity::new(
///     serial.clone(),
///     IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)),
///     28376,
/// ));
/// station.snapshot = Some(DeviceSnapshot::online(MetaState::Idle));
/// link.add_device(station, "123456");
/// link.start().await?;
///
/// let registry = DeviceRegistry::new(link);
/// assert!(registry.login(&serial, "123456").await);
/// assert!(registry.start_charge(&serial, None, false).await);
/// assert!(registry.stop_charge(&serial).await);
///
/// // The stop ended a charge, so restarting is refused for a minute.
/// assert!(!registry.start_charge(&serial, None, false).await);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceRegistry<L> {
    inner: Arc<RegistryInner<L>>,
}

impl<L> Clone for DeviceRegistry<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: DeviceLink> DeviceRegistry<L> {
    /// Creates a registry over `link` with default settings.
    #[must_use]
    pub fn new(link: L) -> Self {
        Self::with_config(link, RegistryConfig::default())
    }

    /// Creates a registry over `link`.
    #[must_use]
    pub fn with_config(link: L, config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                link,
                guard: ChargeGuard::new(config.default_protection),
                event_bus: EventBus::with_capacity(config.event_capacity),
                entries: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Returns the device link.
    #[must_use]
    pub fn link(&self) -> &L {
        &self.inner.link
    }

    /// Returns the registry settings.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Returns the start protection guard.
    #[must_use]
    pub fn guard(&self) -> &ChargeGuard {
        &self.inner.guard
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to fleet events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.inner.event_bus.subscribe()
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.inner.event_bus
    }

    // =========================================================================
    // Known stations
    // =========================================================================

    /// Returns the serials of every station seen so far, sorted.
    #[must_use]
    pub fn known_serials(&self) -> Vec<Serial> {
        let mut serials: Vec<Serial> = self.inner.entries.read().keys().cloned().collect();
        serials.sort();
        serials
    }

    /// Returns `true` if the link has reported `serial` at least once.
    #[must_use]
    pub fn is_known(&self, serial: &Serial) -> bool {
        self.inner.entries.read().contains_key(serial)
    }

    /// Returns when the link first reported `serial`.
    #[must_use]
    pub fn discovered_at(&self, serial: &Serial) -> Option<DateTime<Utc>> {
        self.inner
            .entries
            .read()
            .get(serial)
            .map(|entry| entry.discovered_at)
    }

    /// Registers a station on first sighting and returns its entry.
    fn track(&self, serial: &Serial) -> Arc<RegistryEntry> {
        if let Some(entry) = self.inner.entries.read().get(serial) {
            return Arc::clone(entry);
        }

        let mut entries = self.inner.entries.write();
        let mut discovered = false;
        let entry = entries.entry(serial.clone()).or_insert_with(|| {
            discovered = true;
            Arc::new(RegistryEntry {
                command_lock: tokio::sync::Mutex::new(()),
                discovered_at: Utc::now(),
            })
        });
        let entry = Arc::clone(entry);
        drop(entries);

        if discovered {
            tracing::info!(%serial, "Station discovered");
            self.inner
                .event_bus
                .publish(FleetEvent::device_discovered(serial.clone()));
        }
        entry
    }

    /// Returns the entry of a station, asking the link if it is not known yet.
    async fn entry(&self, serial: &Serial) -> Result<Arc<RegistryEntry>> {
        let known = self.inner.entries.read().get(serial).cloned();
        if let Some(entry) = known {
            return Ok(entry);
        }
        self.fetch(serial).await?;
        Ok(self.track(serial))
    }

    // =========================================================================
    // Link access
    // =========================================================================

    /// Runs a link call under the command timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = std::result::Result<T, LinkError>>,
    ) -> Result<T> {
        let timeout = self.inner.config.command_timeout;
        match tokio::time::timeout(timeout, future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(LinkError::NotStarted)) => Err(Error::LinkUnavailable(format!(
                "{operation}: link is not started"
            ))),
            Ok(Err(e)) => Err(Error::Link(e)),
            Err(_) => Err(Error::Timeout { operation, timeout }),
        }
    }

    /// Forwards a command and turns a decline into [`Error::Rejected`].
    async fn command(
        &self,
        serial: &Serial,
        operation: &'static str,
        future: impl Future<Output = std::result::Result<bool, LinkError>>,
    ) -> Result<()> {
        if self.call(operation, future).await? {
            Ok(())
        } else {
            Err(Error::Rejected {
                serial: serial.clone(),
                operation,
            })
        }
    }

    /// Fetches one station from the link.
    async fn fetch(&self, serial: &Serial) -> Result<LinkDevice> {
        let device = self
            .call("get_device", self.inner.link.device(serial))
            .await?
            .ok_or_else(|| Error::DeviceUnknown(serial.clone()))?;
        self.track(serial);
        Ok(device)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Logs in to a station.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnknown`] for an unknown serial,
    /// [`Error::Rejected`] if the password is refused, and link or timeout
    /// errors if the request cannot be delivered.
    pub async fn try_login(&self, serial: &Serial, password: &str) -> Result<()> {
        self.entry(serial).await?;
        self.command(serial, "login", self.inner.link.login(serial, password))
            .await?;
        tracing::info!(%serial, "Logged in");
        Ok(())
    }

    /// Logs in to a station. Returns `false` on any failure.
    pub async fn login(&self, serial: &Serial, password: &str) -> bool {
        collapse(serial, "login", self.try_login(serial, password).await)
    }

    /// Starts charging and returns the current that was requested.
    ///
    /// The start is refused while start protection is running. Without an
    /// explicit `amps`, the current is chosen by [`resolve_amperage`] from
    /// the station's configured and advertised limits. Starting never arms
    /// start protection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtectionActive`] while the cooldown runs,
    /// [`Error::DeviceUnknown`] for an unknown serial, [`Error::Rejected`] if
    /// the station declines, and link or timeout errors otherwise.
    pub async fn try_start_charge(
        &self,
        serial: &Serial,
        amps: Option<u8>,
        single_phase: bool,
    ) -> Result<u8> {
        let entry = self.entry(serial).await?;
        let _held = entry.command_lock.lock().await;

        if let GuardState::Armed { remaining } = self.inner.guard.state(serial)
            && !remaining.is_zero()
        {
            tracing::warn!(
                %serial,
                remaining_secs = remaining.as_secs(),
                protection_minutes = self.inner.guard.protection(serial).value(),
                "Start protection active, charge start refused"
            );
            self.inner
                .event_bus
                .publish(FleetEvent::start_blocked(serial.clone(), remaining));
            return Err(Error::ProtectionActive {
                serial: serial.clone(),
                remaining,
            });
        }

        let device = self.fetch(serial).await?;
        let amps = resolve_amperage(
            amps,
            device.settings.max_electricity,
            device.advertised_max_electricity(),
        );

        self.command(
            serial,
            "charge_start",
            self.inner.link.charge_start(serial, amps, single_phase),
        )
        .await?;

        tracing::info!(%serial, amps, single_phase, "Charge started");
        self.inner.event_bus.publish(FleetEvent::ChargeStarted {
            serial: serial.clone(),
            amps,
            single_phase,
        });
        Ok(amps)
    }

    /// Starts charging. Returns `false` if refused or on any failure.
    pub async fn start_charge(&self, serial: &Serial, amps: Option<u8>, single_phase: bool) -> bool {
        collapse(
            serial,
            "charge_start",
            self.try_start_charge(serial, amps, single_phase).await,
        )
    }

    /// Stops charging and returns whether start protection was armed.
    ///
    /// Stops are never gated, not even by a failed status read: the command
    /// is forwarded anyway and protection stays unarmed. Protection is armed
    /// only when the station reported
    /// [`MetaState::Charging`](crate::types::MetaState::Charging) right
    /// before the stop and the stop was acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnknown`] for an unknown serial,
    /// [`Error::Rejected`] if the station declines, and link or timeout
    /// errors otherwise. Protection is left untouched on every error.
    pub async fn try_stop_charge(&self, serial: &Serial) -> Result<bool> {
        let entry = self.entry(serial).await?;
        let _held = entry.command_lock.lock().await;

        let was_charging = match self.fetch(serial).await {
            Ok(device) => device.is_charging(),
            Err(e) => {
                tracing::warn!(%serial, error = %e, "Status read failed, stopping anyway");
                false
            }
        };
        self.command(serial, "charge_stop", self.inner.link.charge_stop(serial))
            .await?;

        if was_charging {
            self.inner.guard.record_stop(serial);
        }
        tracing::info!(%serial, cooldown_armed = was_charging, "Charge stopped");
        self.inner.event_bus.publish(FleetEvent::ChargeStopped {
            serial: serial.clone(),
            cooldown_armed: was_charging,
        });
        Ok(was_charging)
    }

    /// Stops charging. Returns `false` on any failure.
    pub async fn stop_charge(&self, serial: &Serial) -> bool {
        collapse(serial, "charge_stop", self.try_stop_charge(serial).await)
    }

    /// Writes the configured current limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnknown`] for an unknown serial,
    /// [`Error::Rejected`] if the station declines, and link or timeout
    /// errors otherwise.
    pub async fn try_set_max_current(&self, serial: &Serial, limit: CurrentLimit) -> Result<()> {
        self.entry(serial).await?;
        self.command(
            serial,
            "set_max_electricity",
            self.inner.link.set_max_electricity(serial, limit.amps()),
        )
        .await?;
        tracing::info!(%serial, amps = limit.amps(), "Current limit set");
        Ok(())
    }

    /// Writes the configured current limit. Returns `false` if `amps` is
    /// outside [6, 32] or on any failure.
    pub async fn set_max_current(&self, serial: &Serial, amps: u8) -> bool {
        let result = match CurrentLimit::new(amps) {
            Ok(limit) => self.try_set_max_current(serial, limit).await,
            Err(e) => Err(e.into()),
        };
        collapse(serial, "set_max_electricity", result)
    }

    /// Writes the station name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnknown`] for an unknown serial,
    /// [`Error::Rejected`] if the station declines, and link or timeout
    /// errors otherwise.
    pub async fn try_set_name(&self, serial: &Serial, name: &str) -> Result<()> {
        self.entry(serial).await?;
        self.command(serial, "set_name", self.inner.link.set_name(serial, name))
            .await
    }

    /// Writes the station name. Returns `false` on any failure.
    pub async fn set_name(&self, serial: &Serial, name: &str) -> bool {
        collapse(serial, "set_name", self.try_set_name(serial, name).await)
    }

    /// Sets the station clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnknown`] for an unknown serial,
    /// [`Error::Rejected`] if the station declines, and link or timeout
    /// errors otherwise.
    pub async fn try_sync_time(&self, serial: &Serial) -> Result<()> {
        self.entry(serial).await?;
        self.command(serial, "sync_time", self.inner.link.sync_time(serial))
            .await
    }

    /// Sets the station clock. Returns `false` on any failure.
    pub async fn sync_time(&self, serial: &Serial) -> bool {
        collapse(serial, "sync_time", self.try_sync_time(serial).await)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Returns the published record of one station.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnknown`] for an unknown serial and link or
    /// timeout errors if the link cannot be read.
    pub async fn try_device(&self, serial: &Serial) -> Result<DeviceRecord> {
        let device = self.fetch(serial).await?;
        Ok(DeviceRecord::from_device(&device))
    }

    /// Returns the published record of one station, `None` on any failure.
    pub async fn device(&self, serial: &Serial) -> Option<DeviceRecord> {
        match self.try_device(serial).await {
            Ok(record) => Some(record),
            Err(e) => {
                log_failure(serial, "get_device", &e);
                None
            }
        }
    }

    /// Returns the records of every station the link knows about.
    ///
    /// An empty mapping is a valid answer and means no station is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LinkUnavailable`] if the link is not started,
    /// [`Error::TransientFetchFailure`] if the device table cannot be read,
    /// and [`Error::Timeout`] if the fetch does not finish in time.
    pub async fn all_devices(&self) -> Result<BTreeMap<Serial, DeviceRecord>> {
        if !self.inner.link.is_started() {
            return Err(Error::LinkUnavailable("link is not started".to_string()));
        }

        let devices = match self.call("get_all_devices", self.inner.link.all_devices()).await {
            Ok(devices) => devices,
            Err(Error::Link(e)) => return Err(Error::TransientFetchFailure(e)),
            Err(e) => return Err(e),
        };

        Ok(devices
            .iter()
            .map(|device| {
                self.track(device.serial());
                (device.serial().clone(), DeviceRecord::from_device(device))
            })
            .collect())
    }

    // =========================================================================
    // Start protection
    // =========================================================================

    /// Sets the start protection window of a station.
    ///
    /// Waits for a start or stop in progress on the same station. The last
    /// recorded stop is kept, so shortening the window can allow a start
    /// immediately.
    pub async fn set_protection_minutes(&self, serial: &Serial, protection: ProtectionMinutes) {
        let entry = self.inner.entries.read().get(serial).cloned();
        let _held = match &entry {
            Some(entry) => Some(entry.command_lock.lock().await),
            None => None,
        };

        self.inner.guard.set_protection(serial, protection);
        self.inner.event_bus.publish(FleetEvent::ProtectionChanged {
            serial: serial.clone(),
            protection,
        });
    }

    /// Returns the start protection window, the default if never set.
    #[must_use]
    pub fn protection_minutes(&self, serial: &Serial) -> ProtectionMinutes {
        self.inner.guard.protection(serial)
    }

    /// Returns the time left before a start is allowed, zero if allowed now.
    #[must_use]
    pub fn cooldown_remaining(&self, serial: &Serial) -> Duration {
        self.inner.guard.remaining(serial)
    }
}

/// Logs a failed operation at a level matching its cause.
fn log_failure(serial: &Serial, operation: &'static str, error: &Error) {
    match error {
        // Already reported where the start was refused.
        Error::ProtectionActive { .. } => {}
        Error::DeviceUnknown(_) => tracing::error!(%serial, operation, "Station not found"),
        _ => tracing::warn!(%serial, operation, error = %error, "Operation failed"),
    }
}

/// Collapses an operation result into a success flag.
fn collapse<T>(serial: &Serial, operation: &'static str, result: Result<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            log_failure(serial, operation, &e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::link::{DeviceIdentity, DeviceInfo, DeviceSnapshot, LinkCommand, MemoryLink};
    use crate::types::MetaState;

    fn serial() -> Serial {
        Serial::new("ABC123").unwrap()
    }

    fn station(serial: &Serial, state: MetaState) -> LinkDevice {
        let identity = DeviceIdentity::new(
            serial.clone(),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)),
            28376,
        );
        let mut device = LinkDevice::new(identity);
        device.snapshot = Some(DeviceSnapshot::online(state));
        device
    }

    async fn registry_with(state: MetaState) -> (DeviceRegistry<MemoryLink>, MemoryLink) {
        let link = MemoryLink::new();
        link.add_device(station(&serial(), state), "123456");
        link.start().await.unwrap();
        (DeviceRegistry::new(link.clone()), link)
    }

    fn start_amps(link: &MemoryLink) -> Vec<u8> {
        link.commands()
            .into_iter()
            .filter_map(|command| match command {
                LinkCommand::ChargeStart { amps, .. } => Some(amps),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn unknown_serial_fails_everywhere() {
        let (registry, link) = registry_with(MetaState::Idle).await;
        let unknown = Serial::new("abc123").unwrap();

        assert!(!registry.login(&unknown, "123456").await);
        assert!(!registry.start_charge(&unknown, None, false).await);
        assert!(!registry.stop_charge(&unknown).await);
        assert!(!registry.set_max_current(&unknown, 16).await);
        assert!(!registry.set_name(&unknown, "Garage").await);
        assert!(!registry.sync_time(&unknown).await);
        assert!(registry.device(&unknown).await.is_none());
        assert!(
            registry
                .try_stop_charge(&unknown)
                .await
                .unwrap_err()
                .is_device_unknown()
        );
        assert!(!registry.is_known(&unknown));
        assert!(link.commands().is_empty());
    }

    #[tokio::test]
    async fn login_forwards_password() {
        let (registry, _link) = registry_with(MetaState::NotLoggedIn).await;

        assert!(!registry.login(&serial(), "wrong").await);
        assert!(registry.login(&serial(), "123456").await);
        assert!(registry.device(&serial()).await.unwrap().logged_in);
    }

    #[tokio::test]
    async fn start_resolves_safe_default_current() {
        let (registry, link) = registry_with(MetaState::Idle).await;
        link.update_device(&serial(), |device| {
            if let Some(snapshot) = device.snapshot.as_mut() {
                snapshot.info = DeviceInfo {
                    max_electricity: 32,
                    ..DeviceInfo::default()
                };
            }
        });

        assert_eq!(
            registry.try_start_charge(&serial(), None, false).await.unwrap(),
            16
        );
        assert_eq!(start_amps(&link), vec![16]);
    }

    #[tokio::test]
    async fn start_prefers_configured_limit_then_explicit_value() {
        let (registry, link) = registry_with(MetaState::Idle).await;
        link.update_device(&serial(), |device| device.settings.max_electricity = 10);

        assert_eq!(
            registry.try_start_charge(&serial(), None, true).await.unwrap(),
            10
        );
        assert_eq!(
            registry
                .try_start_charge(&serial(), Some(25), false)
                .await
                .unwrap(),
            25
        );
        assert_eq!(start_amps(&link), vec![10, 25]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_charging_arms_protection() {
        let (registry, _link) = registry_with(MetaState::Idle).await;

        assert!(registry.start_charge(&serial(), None, false).await);
        assert!(registry.try_stop_charge(&serial()).await.unwrap());
        assert_eq!(registry.cooldown_remaining(&serial()), Duration::from_secs(60));

        let error = registry
            .try_start_charge(&serial(), None, false)
            .await
            .unwrap_err();
        assert!(error.is_protection_active());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_leaves_protection_unarmed() {
        let (registry, link) = registry_with(MetaState::Idle).await;

        assert!(!registry.try_stop_charge(&serial()).await.unwrap());
        assert!(registry.guard().cooldown_state(&serial()).is_none());
        assert!(registry.start_charge(&serial(), None, false).await);
        assert_eq!(start_amps(&link).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_scenario() {
        let (registry, link) = registry_with(MetaState::Charging).await;

        assert!(registry.stop_charge(&serial()).await);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!registry.start_charge(&serial(), None, false).await);
        assert_eq!(registry.cooldown_remaining(&serial()), Duration::from_secs(30));
        assert!(start_amps(&link).is_empty());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(registry.start_charge(&serial(), None, false).await);
        assert_eq!(start_amps(&link), vec![16]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_never_gated() {
        let (registry, _link) = registry_with(MetaState::Charging).await;

        assert!(registry.stop_charge(&serial()).await);
        assert!(!registry.guard().can_start(&serial()));
        assert!(registry.stop_charge(&serial()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_forwarded_when_status_read_fails() {
        let (registry, link) = registry_with(MetaState::Charging).await;
        registry.all_devices().await.unwrap();
        link.fail_device_reads(Some(LinkError::Protocol("bad frame".to_string())));

        assert!(!registry.try_stop_charge(&serial()).await.unwrap());

        let stops = link
            .commands()
            .into_iter()
            .filter(|command| matches!(command, LinkCommand::ChargeStop { .. }))
            .count();
        assert_eq!(stops, 1);
        assert!(registry.guard().cooldown_state(&serial()).is_none());
        assert!(registry.guard().can_start(&serial()));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_stop_commits_nothing() {
        let link = MemoryLink::new();
        link.add_device(station(&serial(), MetaState::Charging), "123456");
        link.start().await.unwrap();
        link.set_command_delay(Duration::from_secs(5));
        let registry = DeviceRegistry::with_config(
            link.clone(),
            RegistryConfig::new().with_command_timeout(Duration::from_secs(1)),
        );

        let error = registry.try_stop_charge(&serial()).await.unwrap_err();
        assert!(matches!(
            error,
            Error::Timeout {
                operation: "charge_stop",
                ..
            }
        ));
        assert!(registry.guard().cooldown_state(&serial()).is_none());
        assert!(registry.guard().can_start(&serial()));
        assert!(link.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_stop_leaves_protection_unarmed() {
        let (registry, link) = registry_with(MetaState::Charging).await;
        link.reject_commands(true);

        assert!(matches!(
            registry.try_stop_charge(&serial()).await,
            Err(Error::Rejected {
                operation: "charge_stop",
                ..
            })
        ));
        assert!(registry.guard().can_start(&serial()));
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_protection_allows_restart() {
        let (registry, _link) = registry_with(MetaState::Charging).await;

        assert!(registry.stop_charge(&serial()).await);
        assert!(!registry.start_charge(&serial(), None, false).await);

        registry
            .set_protection_minutes(&serial(), ProtectionMinutes::DISABLED)
            .await;
        assert!(registry.start_charge(&serial(), None, false).await);
    }

    #[tokio::test]
    async fn protection_defaults_to_one_minute() {
        let (registry, _link) = registry_with(MetaState::Idle).await;
        assert_eq!(registry.protection_minutes(&serial()).value(), 1);

        registry
            .set_protection_minutes(&serial(), ProtectionMinutes::new(15).unwrap())
            .await;
        assert_eq!(registry.protection_minutes(&serial()).value(), 15);
    }

    #[tokio::test]
    async fn set_max_current_validates_range() {
        let (registry, link) = registry_with(MetaState::Idle).await;

        assert!(!registry.set_max_current(&serial(), 5).await);
        assert!(!registry.set_max_current(&serial(), 33).await);
        assert!(registry.set_max_current(&serial(), 20).await);

        assert_eq!(
            link.commands(),
            vec![LinkCommand::SetMaxElectricity {
                serial: serial(),
                amps: 20
            }]
        );
        let record = registry.device(&serial()).await.unwrap();
        assert_eq!(record.configured_max_electricity, 20);
    }

    #[tokio::test]
    async fn name_and_clock_are_forwarded() {
        let (registry, _link) = registry_with(MetaState::Idle).await;

        assert!(registry.set_name(&serial(), "Garage").await);
        assert!(registry.sync_time(&serial()).await);
        assert_eq!(registry.device(&serial()).await.unwrap().name, "Garage");
    }

    #[tokio::test]
    async fn all_devices_requires_started_link() {
        let link = MemoryLink::new();
        link.add_device(station(&serial(), MetaState::Idle), "123456");
        let registry = DeviceRegistry::new(link.clone());

        assert!(matches!(
            registry.all_devices().await,
            Err(Error::LinkUnavailable(_))
        ));
        assert!(!registry.login(&serial(), "123456").await);

        link.start().await.unwrap();
        let records = registry.all_devices().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[&serial()].state, MetaState::Idle);
    }

    #[tokio::test]
    async fn all_devices_reports_fetch_failure() {
        let (registry, link) = registry_with(MetaState::Idle).await;
        link.fail_fetch(Some(LinkError::Protocol("bad datagram".to_string())));

        assert!(matches!(
            registry.all_devices().await,
            Err(Error::TransientFetchFailure(LinkError::Protocol(_)))
        ));
    }

    #[tokio::test]
    async fn empty_fleet_is_a_valid_answer() {
        let link = MemoryLink::new();
        link.start().await.unwrap();
        let registry = DeviceRegistry::new(link);

        assert!(registry.all_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_sighting_registers_and_announces() {
        let (registry, _link) = registry_with(MetaState::Idle).await;
        let mut events = registry.subscribe();

        registry.all_devices().await.unwrap();
        registry.all_devices().await.unwrap();

        assert_eq!(registry.known_serials(), vec![serial()]);
        assert!(registry.discovered_at(&serial()).is_some());
        assert_eq!(
            events.try_recv().unwrap(),
            FleetEvent::device_discovered(serial())
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn charge_events_are_published() {
        let (registry, _link) = registry_with(MetaState::Idle).await;
        registry.all_devices().await.unwrap();
        let mut events = registry.subscribe();

        registry.start_charge(&serial(), Some(12), true).await;
        registry.stop_charge(&serial()).await;
        registry.start_charge(&serial(), None, false).await;

        assert_eq!(
            events.try_recv().unwrap(),
            FleetEvent::ChargeStarted {
                serial: serial(),
                amps: 12,
                single_phase: true,
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            FleetEvent::ChargeStopped {
                serial: serial(),
                cooldown_armed: true,
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            FleetEvent::start_blocked(serial(), Duration::from_secs(60))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_guard_state() {
        let (registry, _link) = registry_with(MetaState::Charging).await;
        let other = registry.clone();

        assert!(registry.stop_charge(&serial()).await);
        assert!(!other.guard().can_start(&serial()));
    }
}
