// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process-wide hub sharing one link between setup entries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::link::DeviceLink;
use crate::manager::{DeviceRegistry, RegistryConfig};
use crate::polling::{PollingConfig, PollingCoordinator};
use crate::types::Serial;

use super::entry_config::{EntryConfig, SetupConfig};

/// Outcome of a successful entry setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySetup {
    /// Identifier of the entry.
    pub entry_id: String,
    /// Station owned by the entry.
    pub serial: Serial,
    /// Whether a login attempt succeeded.
    pub logged_in: bool,
    /// Whether the station was present in the first refresh.
    pub discovered: bool,
}

/// Shared link, registry and coordinator for every host entry.
///
/// The hub is created once per process. Entries register as owners through
/// [`setup_entry`](Self::setup_entry); the link is started by the first
/// setup and stopped only when the last owner is unloaded.
///
/// # Examples
///
/// ```no_run
/// use evse_sync::hub::{EntryConfig, FleetHub};
/// use evse_sync::link::MemoryLink;
/// use evse_sync::types::Serial;
///
/// # async fn example() -> evse_sync::Result<()> {
/// let hub = FleetHub::builder(MemoryLink::new()).build();
///
/// let entry = EntryConfig::new("entry-1", Serial::new("ABC123")?, "123456");
/// let setup = hub.setup_entry(entry).await?;
/// println!("logged in: {}", setup.logged_in);
///
/// hub.unload_entry("entry-1").await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FleetHub<L> {
    registry: DeviceRegistry<L>,
    coordinator: PollingCoordinator<L>,
    setup: SetupConfig,
    /// Owning entries, keyed by entry id. Also serialises setup and unload.
    owners: Mutex<BTreeMap<String, EntryConfig>>,
    shut_down: AtomicBool,
}

impl<L: DeviceLink> FleetHub<L> {
    /// Returns a builder for a hub over `link`.
    #[must_use]
    pub fn builder(link: L) -> FleetHubBuilder<L> {
        FleetHubBuilder::new(link)
    }

    /// Returns the device registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry<L> {
        &self.registry
    }

    /// Returns the polling coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &PollingCoordinator<L> {
        &self.coordinator
    }

    /// Returns the ids of the owning entries, sorted.
    pub async fn owners(&self) -> Vec<String> {
        self.owners.lock().await.keys().cloned().collect()
    }

    /// Returns the configuration of one entry.
    pub async fn entry(&self, entry_id: &str) -> Option<EntryConfig> {
        self.owners.lock().await.get(entry_id).cloned()
    }

    /// Sets up an entry and registers it as an owner.
    ///
    /// Starts the link if it is not running, waits for discovery, tries to
    /// log in, runs the first refresh and starts periodic polling. Failing to
    /// log in is logged and reported in [`EntrySetup::logged_in`]; the caller
    /// is expected to retry setup later.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LinkUnavailable`] if the link cannot be started.
    pub async fn setup_entry(&self, entry: EntryConfig) -> Result<EntrySetup> {
        let mut owners = self.owners.lock().await;
        tracing::info!(
            entry_id = %entry.entry_id,
            serial = %entry.serial,
            name = entry.display_name(),
            port = entry.port,
            "Setting up entry"
        );

        if !self.registry.link().is_started() {
            self.start_link().await?;
        }
        self.shut_down.store(false, Ordering::Release);

        tokio::time::sleep(self.setup.discovery_delay).await;

        let logged_in = if entry.password.is_empty() {
            false
        } else {
            self.login_with_retries(&entry).await
        };

        let snapshot = self.coordinator.refresh().await;
        let discovered = match snapshot.device(&entry.serial) {
            Some(record) => {
                if record.port != entry.port {
                    tracing::warn!(
                        serial = %entry.serial,
                        expected_port = entry.port,
                        reported_port = record.port,
                        "Station answers on another port"
                    );
                }
                true
            }
            None => {
                tracing::warn!(serial = %entry.serial, "Station not found in first refresh");
                false
            }
        };
        self.coordinator.start();

        let setup = EntrySetup {
            entry_id: entry.entry_id.clone(),
            serial: entry.serial.clone(),
            logged_in,
            discovered,
        };
        if owners.insert(entry.entry_id.clone(), entry).is_some() {
            tracing::warn!(entry_id = %setup.entry_id, "Entry was already set up, replaced");
        }
        Ok(setup)
    }

    async fn start_link(&self) -> Result<()> {
        let timeout = self.registry.config().command_timeout;
        match tokio::time::timeout(timeout, self.registry.link().start()).await {
            Ok(Ok(())) => {
                tracing::info!("Device link started");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Unable to start device link");
                Err(Error::LinkUnavailable(e.to_string()))
            }
            Err(_) => {
                tracing::error!(timeout_ms = timeout.as_millis(), "Device link start timed out");
                Err(Error::LinkUnavailable(format!(
                    "start timed out after {} ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    async fn login_with_retries(&self, entry: &EntryConfig) -> bool {
        let attempts = self.setup.login_attempts.max(1);
        for attempt in 1..=attempts {
            if self.registry.login(&entry.serial, &entry.password).await {
                tracing::info!(serial = %entry.serial, "Connected to station");
                return true;
            }
            tracing::warn!(
                serial = %entry.serial,
                attempt,
                attempts,
                "Login attempt failed"
            );
            if attempt < attempts {
                tokio::time::sleep(self.setup.login_retry_delay).await;
            }
        }
        tracing::warn!(serial = %entry.serial, attempts, "Unable to log in to station");
        false
    }

    /// Writes the current limit and asks for an immediate refresh so the
    /// new value is published without waiting for the next tick.
    pub async fn set_max_current(&self, serial: &Serial, amps: u8) -> bool {
        let accepted = self.registry.set_max_current(serial, amps).await;
        if accepted {
            self.coordinator.request_refresh();
        }
        accepted
    }

    /// Removes an entry. Stops polling and the link when it was the last
    /// owner.
    ///
    /// Returns `false` if the entry was not set up.
    pub async fn unload_entry(&self, entry_id: &str) -> bool {
        let mut owners = self.owners.lock().await;
        if owners.remove(entry_id).is_none() {
            return false;
        }
        tracing::info!(entry_id, remaining_owners = owners.len(), "Entry unloaded");

        if owners.is_empty() {
            self.release().await;
        }
        true
    }

    /// Unloads then sets up an entry again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LinkUnavailable`] if the link cannot be restarted.
    pub async fn reload_entry(&self, entry: EntryConfig) -> Result<EntrySetup> {
        self.unload_entry(&entry.entry_id).await;
        self.setup_entry(entry).await
    }

    /// Drops every owner, stops polling and stops the link.
    ///
    /// Safe to call any number of times. Start protection state and the last
    /// published snapshot stay readable afterwards.
    pub async fn shutdown(&self) {
        let mut owners = self.owners.lock().await;
        owners.clear();
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        self.release().await;
    }

    async fn release(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.coordinator.shutdown().await;
        self.registry.link().stop().await;
        tracing::info!("Device link stopped");
    }
}

/// Builder for a [`FleetHub`].
#[derive(Debug)]
pub struct FleetHubBuilder<L> {
    link: L,
    registry: RegistryConfig,
    polling: PollingConfig,
    setup: SetupConfig,
}

impl<L: DeviceLink> FleetHubBuilder<L> {
    fn new(link: L) -> Self {
        Self {
            link,
            registry: RegistryConfig::default(),
            polling: PollingConfig::default(),
            setup: SetupConfig::default(),
        }
    }

    /// Sets the registry settings.
    #[must_use]
    pub fn with_registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry = config;
        self
    }

    /// Sets the polling settings.
    #[must_use]
    pub fn with_polling_config(mut self, config: PollingConfig) -> Self {
        self.polling = config;
        self
    }

    /// Sets the setup sequence timing.
    #[must_use]
    pub fn with_setup_config(mut self, config: SetupConfig) -> Self {
        self.setup = config;
        self
    }

    /// Builds the hub. The link is not started until the first entry is
    /// set up.
    #[must_use]
    pub fn build(self) -> FleetHub<L> {
        let registry = DeviceRegistry::with_config(self.link, self.registry);
        let coordinator = PollingCoordinator::new(registry.clone(), self.polling);
        FleetHub {
            registry,
            coordinator,
            setup: self.setup,
            owners: Mutex::new(BTreeMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }
}
