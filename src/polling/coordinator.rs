// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic fleet refresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::event::FleetEvent;
use crate::link::DeviceLink;
use crate::manager::DeviceRegistry;
use crate::record::DeviceRecord;
use crate::types::Serial;

use super::fleet_snapshot::{FleetSnapshot, PollPhase};
use super::polling_config::PollingConfig;

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct CoordinatorInner<L> {
    registry: DeviceRegistry<L>,
    config: PollingConfig,
    snapshot_tx: watch::Sender<Arc<FleetSnapshot>>,
    phase: Mutex<PollPhase>,
    refresh_requested: Notify,
    /// Keeps poll cycles from overlapping.
    cycle_lock: tokio::sync::Mutex<()>,
    task: Mutex<Option<PollTask>>,
}

/// Keeps a published [`FleetSnapshot`] up to date.
///
/// Every tick fetches all records through the [`DeviceRegistry`]. A failed
/// fetch, including one attempted while the link is not started, is never
/// published as fresh data: the previous mapping is republished in the
/// [`PollPhase::Degraded`] phase and the failure is only logged. An empty
/// successful fetch is published as is.
///
/// Polling only reads through the registry, so it never blocks commands.
///
/// # Examples
///
/// ```no_run
/// use evse_sync::link::{DeviceLink, MemoryLink};
/// use evse_sync::manager::DeviceRegistry;
/// use evse_sync::polling::{PollingConfig, PollingCoordinator};
///
/// # async fn example() {
/// let link = MemoryLink::new();
/// link.start().await.unwrap();
/// let coordinator = PollingCoordinator::new(DeviceRegistry::new(link), PollingConfig::default());
///
/// let mut snapshots = coordinator.subscribe();
/// coordinator.start();
///
/// while snapshots.changed().await.is_ok() {
///     let snapshot = snapshots.borrow_and_update().clone();
///     println!("{} stations, stale: {}", snapshot.devices.len(), snapshot.is_stale());
/// }
/// # }
/// ```
pub struct PollingCoordinator<L> {
    inner: Arc<CoordinatorInner<L>>,
}

impl<L> Clone for PollingCoordinator<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L> std::fmt::Debug for PollingCoordinator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("config", &self.inner.config)
            .field("phase", &*self.inner.phase.lock())
            .field("running", &self.inner.task.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<L: DeviceLink> PollingCoordinator<L> {
    /// Creates a coordinator. Nothing is fetched until
    /// [`refresh`](Self::refresh) or [`start`](Self::start) is called.
    #[must_use]
    pub fn new(registry: DeviceRegistry<L>, config: PollingConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(FleetSnapshot::default()));
        Self {
            inner: Arc::new(CoordinatorInner {
                registry,
                config,
                snapshot_tx,
                phase: Mutex::new(PollPhase::Idle),
                refresh_requested: Notify::new(),
                cycle_lock: tokio::sync::Mutex::new(()),
                task: Mutex::new(None),
            }),
        }
    }

    /// Returns the registry polled by this coordinator.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry<L> {
        &self.inner.registry
    }

    /// Returns the polling settings.
    #[must_use]
    pub fn config(&self) -> &PollingConfig {
        &self.inner.config
    }

    /// Returns the current phase, [`PollPhase::Polling`] while a cycle runs.
    #[must_use]
    pub fn phase(&self) -> PollPhase {
        *self.inner.phase.lock()
    }

    /// Returns the last published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        Arc::clone(&self.inner.snapshot_tx.borrow())
    }

    /// Returns a receiver notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<FleetSnapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Runs one poll cycle and returns the snapshot it published.
    ///
    /// Concurrent calls queue behind each other.
    pub async fn refresh(&self) -> Arc<FleetSnapshot> {
        let _cycle = self.inner.cycle_lock.lock().await;
        *self.inner.phase.lock() = PollPhase::Polling;

        let result = self.fetch().await;
        let previous = self.snapshot();
        let snapshot = match result {
            Ok(devices) => {
                let count = devices.len();
                tracing::debug!(devices = count, "Fleet refreshed");
                self.inner
                    .registry
                    .events()
                    .publish(FleetEvent::PollSucceeded { devices: count });
                FleetSnapshot::published(devices)
            }
            Err(e) => {
                let snapshot = previous.degraded(e.to_string());
                tracing::warn!(
                    error = %e,
                    consecutive_failures = snapshot.consecutive_failures,
                    stale_devices = snapshot.devices.len(),
                    "Fleet refresh failed, keeping previous data"
                );
                self.inner.registry.events().publish(FleetEvent::poll_failed(
                    e.to_string(),
                    snapshot.consecutive_failures,
                ));
                snapshot
            }
        };

        let snapshot = Arc::new(snapshot);
        *self.inner.phase.lock() = snapshot.phase;
        self.inner.snapshot_tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    async fn fetch(&self) -> crate::Result<BTreeMap<Serial, DeviceRecord>> {
        let fetch = self.inner.registry.all_devices();
        match self.inner.config.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fetch)
                .await
                .map_err(|_| Error::Timeout {
                    operation: "poll",
                    timeout,
                })?,
            None => fetch.await,
        }
    }

    /// Asks the polling task to run a cycle now instead of at the next tick.
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.notify_one();
    }

    /// Returns `true` while the polling task runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Spawns the polling task. Does nothing if it already runs.
    ///
    /// The first cycle happens one interval from now, or earlier when
    /// [`request_refresh`](Self::request_refresh) is called.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let coordinator = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { coordinator.run(token).await });
        *task = Some(PollTask { cancel, handle });
    }

    async fn run(self, cancel: CancellationToken) {
        let interval = self.inner.config.interval;
        tracing::info!(interval_secs = interval.as_secs(), "Polling started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Received shutdown signal, stopping polling");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
                () = self.inner.refresh_requested.notified() => {
                    tracing::debug!("Refresh requested");
                }
            }

            self.refresh().await;
        }

        tracing::info!("Polling stopped");
    }

    /// Stops the polling task and waits for it to finish.
    ///
    /// A cycle already in progress is completed first.
    ///
    /// Safe to call any number of times. The last snapshot and the
    /// registry's start protection state stay readable afterwards.
    pub async fn shutdown(&self) {
        let task = self.inner.task.lock().take();
        let Some(task) = task else {
            return;
        };

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            tracing::warn!(error = %e, "Polling task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use super::*;
    use crate::error::LinkError;
    use crate::link::{DeviceIdentity, DeviceSnapshot, LinkDevice, MemoryLink};
    use crate::types::{MetaState, Serial};

    fn serial() -> Serial {
        Serial::new("ABC123").unwrap()
    }

    fn station() -> LinkDevice {
        let identity = DeviceIdentity::new(serial(), IpAddr::V4(Ipv4Addr::LOCALHOST), 28376);
        let mut device = LinkDevice::new(identity);
        device.snapshot = Some(DeviceSnapshot::online(MetaState::Idle));
        device
    }

    async fn coordinator() -> (PollingCoordinator<MemoryLink>, MemoryLink) {
        let link = MemoryLink::new();
        link.add_device(station(), "123456");
        link.start().await.unwrap();
        let coordinator =
            PollingCoordinator::new(DeviceRegistry::new(link.clone()), PollingConfig::default());
        (coordinator, link)
    }

    #[tokio::test]
    async fn starts_idle() {
        let (coordinator, _link) = coordinator().await;

        assert_eq!(coordinator.phase(), PollPhase::Idle);
        assert_eq!(*coordinator.snapshot(), FleetSnapshot::default());
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn successful_refresh_publishes() {
        let (coordinator, _link) = coordinator().await;

        let snapshot = coordinator.refresh().await;

        assert_eq!(snapshot.phase, PollPhase::Published);
        assert!(snapshot.last_fetch_succeeded);
        assert_eq!(snapshot.device(&serial()).unwrap().state, MetaState::Idle);
        assert_eq!(coordinator.phase(), PollPhase::Published);
    }

    #[tokio::test]
    async fn failure_republishes_previous_mapping() {
        let (coordinator, link) = coordinator().await;
        let fresh = coordinator.refresh().await;

        link.fail_fetch(Some(LinkError::ConnectionFailed("socket closed".to_string())));
        let stale = coordinator.refresh().await;

        assert_eq!(stale.devices, fresh.devices);
        assert!(stale.is_stale());
        assert!(!stale.last_fetch_succeeded);
        assert_eq!(stale.consecutive_failures, 1);
        assert_eq!(stale.refreshed_at, fresh.refreshed_at);

        link.fail_fetch(None);
        let recovered = coordinator.refresh().await;
        assert_eq!(recovered.phase, PollPhase::Published);
        assert_eq!(recovered.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn stopped_link_degrades_without_data() {
        let link = MemoryLink::new();
        let coordinator =
            PollingCoordinator::new(DeviceRegistry::new(link), PollingConfig::default());

        let snapshot = coordinator.refresh().await;

        assert_eq!(snapshot.phase, PollPhase::Degraded);
        assert!(snapshot.devices.is_empty());
        assert!(!snapshot.last_fetch_succeeded);
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn empty_fleet_is_published() {
        let link = MemoryLink::new();
        link.start().await.unwrap();
        let coordinator =
            PollingCoordinator::new(DeviceRegistry::new(link), PollingConfig::default());

        let snapshot = coordinator.refresh().await;

        assert_eq!(snapshot.phase, PollPhase::Published);
        assert!(snapshot.devices.is_empty());
        assert!(snapshot.last_fetch_succeeded);
    }

    #[tokio::test]
    async fn poll_events_are_published() {
        let (coordinator, link) = coordinator().await;
        coordinator.refresh().await;
        let mut events = coordinator.registry().subscribe();

        coordinator.refresh().await;
        link.fail_fetch(Some(LinkError::Timeout(500)));
        coordinator.refresh().await;

        assert_eq!(
            events.try_recv().unwrap(),
            FleetEvent::PollSucceeded { devices: 1 }
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            FleetEvent::PollFailed {
                consecutive_failures: 1,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn task_polls_on_interval() {
        let (coordinator, _link) = coordinator().await;
        let mut snapshots = coordinator.subscribe();
        let started = tokio::time::Instant::now();

        coordinator.start();
        assert!(coordinator.is_running());
        snapshots.changed().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(snapshots.borrow().phase, PollPhase::Published);
        coordinator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn requested_refresh_skips_the_wait() {
        let (coordinator, _link) = coordinator().await;
        let mut snapshots = coordinator.subscribe();
        let started = tokio::time::Instant::now();

        coordinator.start();
        coordinator.request_refresh();
        snapshots.changed().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(60));
        coordinator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_and_degrades() {
        let (_, link) = coordinator().await;
        link.set_command_delay(Duration::from_secs(5));
        let coordinator = PollingCoordinator::new(
            DeviceRegistry::new(link),
            PollingConfig::new().with_fetch_timeout(Duration::from_secs(1)),
        );

        let snapshot = coordinator.refresh().await;

        assert_eq!(snapshot.phase, PollPhase::Degraded);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("poll timed out after 1000 ms")
        );
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (coordinator, _link) = coordinator().await;
        coordinator.refresh().await;
        coordinator.start();

        coordinator.shutdown().await;
        coordinator.shutdown().await;

        assert!(!coordinator.is_running());
        assert_eq!(coordinator.snapshot().devices.len(), 1);
    }

    #[tokio::test]
    async fn start_twice_keeps_one_task() {
        let (coordinator, _link) = coordinator().await;

        coordinator.start();
        coordinator.start();
        assert!(coordinator.is_running());

        coordinator.shutdown().await;
        assert!(!coordinator.is_running());
    }
}
