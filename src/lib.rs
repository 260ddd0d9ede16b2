// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `evse_sync` - fleet synchronisation and charge control for EVSE stations.
//!
//! This library sits between a home-automation host and the protocol layer
//! that talks to electric vehicle charging stations. It keeps a periodically
//! refreshed view of every station and guards the commands sent to them.
//!
//! # Features
//!
//! - **Device records**: flat, host-facing projection of each station
//! - **Start protection**: configurable cooldown between a stop and the next
//!   start, so a station is not toggled faster than the car tolerates
//! - **Amperage resolution**: safe current for every start request
//! - **Registry**: per-station command serialisation with timeouts
//! - **Polling**: one shared refresh loop publishing immutable snapshots,
//!   with stale data kept available while the link misbehaves
//! - **Hub**: one link shared by several host entries, stopped with the last
//!
//! The wire protocol itself is not part of this library. It is consumed
//! through the [`DeviceLink`](link::DeviceLink) trait; [`MemoryLink`](link::MemoryLink)
//! provides simulated stations for demos and tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use evse_sync::hub::{EntryConfig, FleetHub};
//! use evse_sync::link::MemoryLink;
//! use evse_sync::types::Serial;
//!
//! #[tokio::main]
//! async fn main() -> evse_sync::Result<()> {
//!     let hub = FleetHub::builder(MemoryLink::new()).build();
//!     let serial = Serial::new("ABC123")?;
//!
//!     hub.setup_entry(EntryConfig::new("entry-1", serial.clone(), "123456"))
//!         .await?;
//!
//!     // Start at the configured maximum, three phases
//!     if hub.registry().start_charge(&serial, None, false).await {
//!         println!("charging");
//!     }
//!
//!     // Read the latest published view
//!     let snapshot = hub.coordinator().snapshot();
//!     if let Some(record) = snapshot.device(&serial) {
//!         println!("{} is {:?}", record.name, record.state);
//!     }
//!
//!     hub.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Start Protection
//!
//! ```no_run
//! use evse_sync::manager::DeviceRegistry;
//! use evse_sync::link::MemoryLink;
//! use evse_sync::types::{ProtectionMinutes, Serial};
//!
//! # async fn example() -> evse_sync::Result<()> {
//! let registry = DeviceRegistry::new(MemoryLink::new());
//! let serial = Serial::new("ABC123")?;
//!
//! registry
//!     .set_protection_minutes(&serial, ProtectionMinutes::new(5)?)
//!     .await;
//!
//! registry.try_stop_charge(&serial).await?;
//! match registry.try_start_charge(&serial, Some(16), false).await {
//!     Err(e) if e.is_protection_active() => println!("{e}"),
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod charge;
pub mod error;
pub mod event;
pub mod hub;
pub mod link;
pub mod manager;
pub mod polling;
pub mod record;
pub mod types;

pub use charge::{ChargeGuard, GuardState, resolve_amperage};
pub use error::{Error, LinkError, Result, ValueError};
pub use event::{EventBus, FleetEvent};
pub use hub::{EntryConfig, EntrySetup, FleetHub, SetupConfig};
pub use link::{DeviceLink, LinkDevice, MemoryLink};
pub use manager::{DeviceRegistry, RegistryConfig};
pub use polling::{FleetSnapshot, PollPhase, PollingConfig, PollingCoordinator};
pub use record::{DeviceRecord, project};
pub use types::{CurrentLimit, MetaState, ProtectionMinutes, Serial, TemperatureUnit};
