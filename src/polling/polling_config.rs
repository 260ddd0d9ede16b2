// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the polling coordinator.

use std::time::Duration;

/// Default time between two poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Settings of a [`PollingCoordinator`](super::PollingCoordinator).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use evse_sync::polling::PollingConfig;
///
/// let config = PollingConfig::new()
///     .with_interval(Duration::from_secs(30))
///     .with_fetch_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.interval, Duration::from_secs(30));
/// assert_eq!(config.fetch_timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Time between two poll cycles.
    pub interval: Duration,
    /// Upper bound for one fetch. `None` relies on the registry's command
    /// timeout alone.
    pub fetch_timeout: Option<Duration>,
}

impl PollingConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval. A zero interval is raised to one millisecond.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets a fetch timeout tighter than the registry's command timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: None,
        }
    }
}
