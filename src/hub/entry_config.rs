// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entry and setup configuration for the fleet hub.

use std::time::Duration;

use crate::link::DEFAULT_PORT;
use crate::record::DEFAULT_DEVICE_NAME;
use crate::types::Serial;

/// One configured station owned by a host setup entry.
///
/// # Examples
///
/// ```
/// use evse_sync::hub::EntryConfig;
/// use evse_sync::types::Serial;
///
/// let entry = EntryConfig::new("entry-1", Serial::new("ABC123").unwrap(), "123456")
///     .with_name("Garage");
///
/// assert_eq!(entry.port, 28376);
/// assert_eq!(entry.display_name(), "Garage");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct EntryConfig {
    /// Identifier of the owning host entry.
    pub entry_id: String,
    /// Station serial.
    pub serial: Serial,
    /// Station password. Empty skips the login step.
    pub password: String,
    /// UDP port the station is expected on.
    ///
    /// Informational only: the link owns the socket. Setup logs a warning
    /// when the station reports a different port.
    pub port: u16,
    /// Display name chosen by the user.
    pub name: Option<String>,
}

impl EntryConfig {
    /// Creates an entry on the default port.
    #[must_use]
    pub fn new(entry_id: impl Into<String>, serial: Serial, password: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            serial,
            password: password.into(),
            port: DEFAULT_PORT,
            name: None,
        }
    }

    /// Sets the expected port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the display name, `EVSEMaster` when none was chosen.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DEVICE_NAME)
    }
}

impl std::fmt::Debug for EntryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryConfig")
            .field("entry_id", &self.entry_id)
            .field("serial", &self.serial)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("name", &self.name)
            .finish()
    }
}

/// Timing of the setup sequence run for each entry.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use evse_sync::hub::SetupConfig;
///
/// let setup = SetupConfig::new()
///     .with_discovery_delay(Duration::from_secs(1))
///     .with_login_attempts(5);
///
/// assert_eq!(setup.login_attempts, 5);
/// assert_eq!(setup.login_retry_delay, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfig {
    /// Wait after starting the link, leaving stations time to announce
    /// themselves.
    pub discovery_delay: Duration,
    /// Login attempts before giving up. A failed login does not fail setup.
    pub login_attempts: u32,
    /// Wait between two login attempts.
    pub login_retry_delay: Duration,
}

impl SetupConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the discovery delay.
    #[must_use]
    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = delay;
        self
    }

    /// Sets the number of login attempts, at least one.
    #[must_use]
    pub fn with_login_attempts(mut self, attempts: u32) -> Self {
        self.login_attempts = attempts.max(1);
        self
    }

    /// Sets the wait between login attempts.
    #[must_use]
    pub fn with_login_retry_delay(mut self, delay: Duration) -> Self {
        self.login_retry_delay = delay;
        self
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            discovery_delay: Duration::from_secs(3),
            login_attempts: 3,
            login_retry_delay: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial() -> Serial {
        Serial::new("ABC123").unwrap()
    }

    #[test]
    fn entry_defaults() {
        let entry = EntryConfig::new("entry-1", serial(), "123456");

        assert_eq!(entry.port, DEFAULT_PORT);
        assert_eq!(entry.display_name(), "EVSEMaster");
    }

    #[test]
    fn empty_name_uses_default() {
        let entry = EntryConfig::new("entry-1", serial(), "").with_name("");
        assert_eq!(entry.display_name(), "EVSEMaster");
    }

    #[test]
    fn debug_hides_password() {
        let entry = EntryConfig::new("entry-1", serial(), "123456").with_port(28377);
        let debug = format!("{entry:?}");

        assert!(!debug.contains("123456"));
        assert!(debug.contains("28377"));
    }

    #[test]
    fn setup_defaults() {
        let setup = SetupConfig::default();

        assert_eq!(setup.discovery_delay, Duration::from_secs(3));
        assert_eq!(setup.login_attempts, 3);
        assert_eq!(setup.login_retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn login_attempts_at_least_one() {
        assert_eq!(SetupConfig::new().with_login_attempts(0).login_attempts, 1);
    }
}
