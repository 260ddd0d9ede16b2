// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device link seam.
//!
//! Discovery, login and the command wire protocol live outside this library.
//! They are consumed through the [`DeviceLink`] trait, which is all the
//! registry needs: lifecycle, a fetch of the known devices, and one call per
//! command.
//!
//! [`MemoryLink`] is an in-process implementation with simulated stations,
//! used for demos and tests.
//!
//! # Command results
//!
//! Command methods return `Ok(true)` when the station acknowledged the
//! command, `Ok(false)` when it answered but declined, and `Err(_)` when the
//! link itself failed (not started, transport error, no answer).

mod device;
mod memory;

pub use device::{
    ChargeSession, DeviceIdentity, DeviceInfo, DeviceSettings, DeviceSnapshot, ElectricalReadings,
    LinkDevice,
};
pub use memory::{LinkCommand, MemoryLink};

use std::future::Future;

use crate::error::LinkError;
use crate::types::Serial;

/// Default UDP port used by the stations.
pub const DEFAULT_PORT: u16 = 28376;

/// Capability offered by the external protocol layer.
///
/// Implementations must be cheap to share (`Arc<L>`) and safe to call from
/// several tasks at once. Every returned future must be `Send` so the
/// registry can drive it from spawned tasks.
pub trait DeviceLink: Send + Sync + 'static {
    /// Starts the link. Calling it on a started link is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the transport cannot be opened.
    fn start(&self) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Stops the link. Calling it on a stopped link is a no-op.
    fn stop(&self) -> impl Future<Output = ()> + Send;

    /// Returns `true` once [`start`](Self::start) has succeeded and until
    /// [`stop`](Self::stop) is called.
    fn is_started(&self) -> bool;

    /// Logs in to a station.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the link cannot deliver the request.
    fn login(
        &self,
        serial: &Serial,
        password: &str,
    ) -> impl Future<Output = Result<bool, LinkError>> + Send;

    /// Returns one station, or `None` if the link has never seen it.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the device table cannot be read.
    fn device(
        &self,
        serial: &Serial,
    ) -> impl Future<Output = Result<Option<LinkDevice>, LinkError>> + Send;

    /// Returns every station the link knows about.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the device table cannot be read.
    fn all_devices(&self) -> impl Future<Output = Result<Vec<LinkDevice>, LinkError>> + Send;

    /// Starts charging at `amps`.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the command cannot be delivered.
    fn charge_start(
        &self,
        serial: &Serial,
        amps: u8,
        single_phase: bool,
    ) -> impl Future<Output = Result<bool, LinkError>> + Send;

    /// Stops charging.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the command cannot be delivered.
    fn charge_stop(&self, serial: &Serial) -> impl Future<Output = Result<bool, LinkError>> + Send;

    /// Writes the configured current limit.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the command cannot be delivered.
    fn set_max_electricity(
        &self,
        serial: &Serial,
        amps: u8,
    ) -> impl Future<Output = Result<bool, LinkError>> + Send;

    /// Writes the station name.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the command cannot be delivered.
    fn set_name(
        &self,
        serial: &Serial,
        name: &str,
    ) -> impl Future<Output = Result<bool, LinkError>> + Send;

    /// Sets the station clock to the current time.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the command cannot be delivered.
    fn sync_time(&self, serial: &Serial) -> impl Future<Output = Result<bool, LinkError>> + Send;
}
