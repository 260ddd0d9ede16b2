// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for charging station control.
//!
//! This module provides type-safe representations of the values exchanged with
//! the registry. Range-checked types validate at construction time, so a value
//! that exists is always within bounds.
//!
//! # Types
//!
//! - [`Serial`] - Opaque, case-sensitive station identifier
//! - [`CurrentLimit`] - Maximum charging current (6-32 A)
//! - [`ProtectionMinutes`] - Anti-wear window after a stop (0-60 min)
//! - [`MetaState`] - Derived operational label (idle, charging, ...)
//! - [`TemperatureUnit`] - Unit used by the station for temperatures

mod current_limit;
mod meta_state;
mod protection;
mod serial;
mod temperature;

pub use current_limit::CurrentLimit;
pub use meta_state::MetaState;
pub use protection::ProtectionMinutes;
pub use serial::Serial;
pub use temperature::TemperatureUnit;
