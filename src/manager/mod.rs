// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device registry for a fleet of charging stations.
//!
//! The [`DeviceRegistry`] is the single entry point for commands. It routes
//! every operation to the device link by serial, gates charge starts through
//! the [`ChargeGuard`](crate::charge::ChargeGuard), fills in a safe current
//! when none is given, and publishes [`FleetEvent`](crate::event::FleetEvent)s.
//!
//! # Examples
//!
//! ## Event Subscription
//!
//! ```no_run
//! use evse_sync::event::FleetEvent;
//! use evse_sync::link::MemoryLink;
//! use evse_sync::manager::DeviceRegistry;
//!
//! # fn example() {
//! let registry = DeviceRegistry::new(MemoryLink::new());
//! let mut events = registry.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let FleetEvent::StartBlocked { serial, remaining } = event {
//!             println!("{serial}: start refused, {} s left", remaining.as_secs());
//!         }
//!     }
//! });
//! # }
//! ```

mod device_registry;
mod registry_config;

pub use device_registry::DeviceRegistry;
pub use registry_config::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_EVENT_CAPACITY, RegistryConfig};
