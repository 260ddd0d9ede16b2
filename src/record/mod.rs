// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Published device records.
//!
//! [`project`] turns what a link knows about a station into a
//! [`DeviceRecord`], the stable flat view handed to consumers.

mod device_record;

pub use device_record::{DEFAULT_DEVICE_NAME, DeviceRecord, project};
