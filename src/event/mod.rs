// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet events.
//!
//! The registry and the polling coordinator publish [`FleetEvent`]s on an
//! [`EventBus`] backed by a tokio broadcast channel. Subscribers receive
//! owned copies, never references into shared state.
//!
//! # Examples
//!
//! ```
//! use evse_sync::event::{EventBus, FleetEvent};
//! use evse_sync::types::Serial;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(FleetEvent::device_discovered(Serial::new("ABC123").unwrap()));
//!
//! let event = rx.try_recv().unwrap();
//! assert_eq!(event.serial().map(Serial::as_str), Some("ABC123"));
//! ```

mod event_bus;
mod fleet_event;

pub use event_bus::EventBus;
pub use fleet_event::FleetEvent;
