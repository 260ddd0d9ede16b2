// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anti-wear cooldown guard.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::types::{ProtectionMinutes, Serial};

/// Cooldown bookkeeping for one station.
///
/// Kept in memory only; a restart forgets every recorded stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownState {
    /// Configured protection window.
    pub protection: ProtectionMinutes,
    /// When the last real charge stop was recorded.
    pub last_stop: Option<Instant>,
}

/// Guard state of one station, as seen at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Protection is disabled; starts always pass.
    Unrestricted,
    /// Protection is enabled; starts pass once `remaining` is zero.
    Armed {
        /// Time left before a start is allowed, zero when already allowed.
        remaining: Duration,
    },
}

impl GuardState {
    /// Returns `true` if a start would be allowed.
    #[must_use]
    pub fn allows_start(&self) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Armed { remaining } => remaining.is_zero(),
        }
    }
}

/// Per-station cooldown state machine gating charge starts.
///
/// Only stops arm the cooldown: rapid stop/start cycling is what wears the
/// contactors, so a start is refused while less than the protection window
/// has passed since the last recorded stop. Starts themselves never arm
/// anything.
///
/// All updates to one station's state happen under a single lock, so
/// readers never see a half-applied change.
///
/// # Examples
///
/// ```
/// use evse_sync::charge::ChargeGuard;
/// use evse_sync::types::{ProtectionMinutes, Serial};
///
/// let guard = ChargeGuard::default();
/// let serial = Serial::new("ABC123").unwrap();
///
/// assert!(guard.can_start(&serial));
///
/// guard.set_protection(&serial, ProtectionMinutes::DISABLED);
/// guard.record_stop(&serial);
/// assert!(guard.can_start(&serial));
/// ```
#[derive(Debug, Default)]
pub struct ChargeGuard {
    states: Mutex<HashMap<Serial, CooldownState>>,
    default_protection: ProtectionMinutes,
}

impl ChargeGuard {
    /// Creates a guard applying `default_protection` to unconfigured stations.
    #[must_use]
    pub fn new(default_protection: ProtectionMinutes) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            default_protection,
        }
    }

    /// Sets the protection window. A recorded stop is kept.
    pub fn set_protection(&self, serial: &Serial, protection: ProtectionMinutes) {
        let mut states = self.states.lock();
        states
            .entry(serial.clone())
            .and_modify(|state| state.protection = protection)
            .or_insert(CooldownState {
                protection,
                last_stop: None,
            });
        tracing::info!(%serial, minutes = protection.value(), "Start protection configured");
    }

    /// Returns the protection window, or the default if never configured.
    #[must_use]
    pub fn protection(&self, serial: &Serial) -> ProtectionMinutes {
        self.states
            .lock()
            .get(serial)
            .map_or(self.default_protection, |state| state.protection)
    }

    /// Returns `true` if a charge start is currently allowed.
    #[must_use]
    pub fn can_start(&self, serial: &Serial) -> bool {
        self.state(serial).allows_start()
    }

    /// Records that a charge was actually stopped now.
    ///
    /// The guard does not check what the station was doing; callers only
    /// record stops that ended an active charge.
    pub fn record_stop(&self, serial: &Serial) {
        let now = Instant::now();
        let default_protection = self.default_protection;
        self.states
            .lock()
            .entry(serial.clone())
            .or_insert(CooldownState {
                protection: default_protection,
                last_stop: None,
            })
            .last_stop = Some(now);
        tracing::debug!(%serial, "Charge stop recorded");
    }

    /// Returns the time left before a start is allowed, zero if allowed now.
    #[must_use]
    pub fn remaining(&self, serial: &Serial) -> Duration {
        match self.state(serial) {
            GuardState::Unrestricted => Duration::ZERO,
            GuardState::Armed { remaining } => remaining,
        }
    }

    /// Returns the guard state of a station at the current instant.
    #[must_use]
    pub fn state(&self, serial: &Serial) -> GuardState {
        let (protection, last_stop) = match self.states.lock().get(serial) {
            Some(state) => (state.protection, state.last_stop),
            None => (self.default_protection, None),
        };
        if protection.is_disabled() {
            return GuardState::Unrestricted;
        }
        let remaining = last_stop.map_or(Duration::ZERO, |stopped_at| {
            protection
                .as_duration()
                .saturating_sub(Instant::now().saturating_duration_since(stopped_at))
        });
        GuardState::Armed { remaining }
    }

    /// Returns a copy of the stored cooldown state, if the station has one.
    #[must_use]
    pub fn cooldown_state(&self, serial: &Serial) -> Option<CooldownState> {
        self.states.lock().get(serial).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial() -> Serial {
        Serial::new("ABC123").unwrap()
    }

    fn minutes(value: u8) -> ProtectionMinutes {
        ProtectionMinutes::new(value).unwrap()
    }

    #[test]
    fn unknown_station_uses_default_and_allows_start() {
        let guard = ChargeGuard::default();

        assert_eq!(guard.protection(&serial()), ProtectionMinutes::DEFAULT);
        assert!(guard.can_start(&serial()));
        assert_eq!(guard.remaining(&serial()), Duration::ZERO);
        assert!(guard.cooldown_state(&serial()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_blocks_until_window_elapses() {
        let guard = ChargeGuard::default();
        guard.set_protection(&serial(), minutes(2));
        guard.record_stop(&serial());

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(!guard.can_start(&serial()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(guard.can_start(&serial()));
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_is_exact() {
        let guard = ChargeGuard::default();
        guard.record_stop(&serial());

        tokio::time::advance(Duration::from_secs(60) - Duration::from_millis(1)).await;
        assert!(!guard.can_start(&serial()));
        assert_eq!(guard.remaining(&serial()), Duration::from_millis(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(guard.can_start(&serial()));
        assert_eq!(guard.remaining(&serial()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_protection_allows_start_immediately() {
        let guard = ChargeGuard::default();
        guard.set_protection(&serial(), minutes(30));
        guard.record_stop(&serial());
        assert!(!guard.can_start(&serial()));

        guard.set_protection(&serial(), ProtectionMinutes::DISABLED);
        assert!(guard.can_start(&serial()));
        assert_eq!(guard.state(&serial()), GuardState::Unrestricted);
    }

    #[tokio::test(start_paused = true)]
    async fn set_protection_keeps_last_stop() {
        let guard = ChargeGuard::default();
        guard.record_stop(&serial());
        let stopped_at = guard.cooldown_state(&serial()).unwrap().last_stop;

        guard.set_protection(&serial(), ProtectionMinutes::DISABLED);
        guard.set_protection(&serial(), minutes(5));

        let state = guard.cooldown_state(&serial()).unwrap();
        assert_eq!(state.last_stop, stopped_at);
        assert!(!guard.can_start(&serial()));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let guard = ChargeGuard::default();
        guard.record_stop(&serial());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(guard.remaining(&serial()), Duration::from_secs(30));
        assert_eq!(
            guard.state(&serial()),
            GuardState::Armed {
                remaining: Duration::from_secs(30)
            }
        );

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(guard.remaining(&serial()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn stations_are_independent() {
        let guard = ChargeGuard::default();
        let other = Serial::new("abc123").unwrap();
        guard.record_stop(&serial());

        assert!(!guard.can_start(&serial()));
        assert!(guard.can_start(&other));
    }

    #[test]
    fn custom_default_protection() {
        let guard = ChargeGuard::new(minutes(10));
        assert_eq!(guard.protection(&serial()).value(), 10);
    }
}
