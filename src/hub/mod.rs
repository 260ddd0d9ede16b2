// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared link lifecycle for host setup entries.
//!
//! A host may configure several stations, each as its own entry, while all
//! of them talk through one device link. [`FleetHub`] keeps the owner list
//! and starts or stops the link, the registry and the polling coordinator
//! accordingly.

mod entry_config;
mod fleet_hub;

pub use entry_config::{EntryConfig, SetupConfig};
pub use fleet_hub::{EntrySetup, FleetHub, FleetHubBuilder};
