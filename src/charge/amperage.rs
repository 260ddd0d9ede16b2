// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Safe default current selection.

/// Current used when no confirmed limit is known yet.
pub const SAFE_FALLBACK_AMPS: u8 = 16;

/// Ceiling assumed when the station has not advertised one.
pub const UNKNOWN_CEILING_AMPS: u8 = 32;

/// Picks the current for a charge start.
///
/// - An explicit `requested` value is passed through unchanged; range checks
///   are the caller's job.
/// - Otherwise the station's configured limit is used when it is positive,
///   since that value has been read back from the station at least once.
/// - Otherwise the result is `min(device_max, 16)`, where an unknown ceiling
///   (`0`) counts as 32. A station is never asked for more than 16 A before
///   its real limit has been observed.
///
/// # Examples
///
/// ```
/// use evse_sync::charge::resolve_amperage;
///
/// assert_eq!(resolve_amperage(Some(25), 10, 32), 25);
/// assert_eq!(resolve_amperage(None, 10, 32), 10);
/// assert_eq!(resolve_amperage(None, 0, 20), 16);
/// assert_eq!(resolve_amperage(None, 0, 10), 10);
/// assert_eq!(resolve_amperage(None, 0, 0), 16);
/// ```
#[must_use]
pub fn resolve_amperage(requested: Option<u8>, configured_max: u8, device_max: u8) -> u8 {
    if let Some(amps) = requested {
        return amps;
    }
    if configured_max > 0 {
        return configured_max;
    }
    let ceiling = if device_max > 0 {
        device_max
    } else {
        UNKNOWN_CEILING_AMPS
    };
    ceiling.min(SAFE_FALLBACK_AMPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_value_passes_through() {
        assert_eq!(resolve_amperage(Some(25), 10, 32), 25);
        assert_eq!(resolve_amperage(Some(25), 0, 0), 25);
        // No clamping, even against the advertised ceiling.
        assert_eq!(resolve_amperage(Some(40), 0, 16), 40);
    }

    #[test]
    fn configured_limit_wins_when_positive() {
        assert_eq!(resolve_amperage(None, 10, 32), 10);
        assert_eq!(resolve_amperage(None, 32, 16), 32);
    }

    #[test]
    fn fallback_never_exceeds_sixteen() {
        assert_eq!(resolve_amperage(None, 0, 20), 16);
        assert_eq!(resolve_amperage(None, 0, 32), 16);
    }

    #[test]
    fn fallback_respects_lower_ceiling() {
        assert_eq!(resolve_amperage(None, 0, 10), 10);
    }

    #[test]
    fn unknown_ceiling_still_falls_back_to_sixteen() {
        assert_eq!(resolve_amperage(None, 0, 0), 16);
    }
}
