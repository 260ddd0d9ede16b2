// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the device registry.

use std::time::Duration;

use crate::types::ProtectionMinutes;

/// Default time a forwarded link call may take.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default event bus capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Settings of a [`DeviceRegistry`](super::DeviceRegistry).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use evse_sync::manager::RegistryConfig;
/// use evse_sync::types::ProtectionMinutes;
///
/// let config = RegistryConfig::new()
///     .with_command_timeout(Duration::from_secs(3))
///     .with_default_protection(ProtectionMinutes::new(5).unwrap());
///
/// assert_eq!(config.command_timeout, Duration::from_secs(3));
/// assert_eq!(config.event_capacity, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Upper bound for every forwarded link call, fetches included.
    ///
    /// A call that does not finish in time fails with
    /// [`Error::Timeout`](crate::Error::Timeout) and commits nothing.
    pub command_timeout: Duration,
    /// Start protection for stations that were never configured.
    pub default_protection: ProtectionMinutes,
    /// Events buffered per subscriber before the oldest are dropped.
    pub event_capacity: usize,
}

impl RegistryConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout for forwarded link calls.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the start protection applied to unconfigured stations.
    #[must_use]
    pub fn with_default_protection(mut self, protection: ProtectionMinutes) -> Self {
        self.default_protection = protection;
        self
    }

    /// Sets the event bus capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            default_protection: ProtectionMinutes::DEFAULT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();

        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert_eq!(config.default_protection.value(), 1);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn builder_overrides() {
        let config = RegistryConfig::new()
            .with_command_timeout(Duration::from_millis(500))
            .with_default_protection(ProtectionMinutes::DISABLED)
            .with_event_capacity(16);

        assert_eq!(config.command_timeout, Duration::from_millis(500));
        assert!(config.default_protection.is_disabled());
        assert_eq!(config.event_capacity, 16);
    }
}
