// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Charge-control safety policies.
//!
//! - [`ChargeGuard`] refuses charge starts until a protection window has
//!   passed since the last real stop, limiting contactor cycling.
//! - [`resolve_amperage`] picks a conservative current when a start request
//!   does not carry one.
//!
//! Both are used by [`DeviceRegistry`](crate::manager::DeviceRegistry); they
//! are public so hosts can display cooldowns or preview the chosen current.

mod amperage;
mod guard;

pub use amperage::{SAFE_FALLBACK_AMPS, UNKNOWN_CEILING_AMPS, resolve_amperage};
pub use guard::{ChargeGuard, CooldownState, GuardState};
