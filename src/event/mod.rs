// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notifications for the device registry.
//!
//! The [`EventBus`] uses tokio's broadcast channel so any number of
//! collaborators (an accessory layer, a REST facade) can follow device
//! state without polling the registry.

mod device_event;
mod event_bus;

pub use device_event::DeviceEvent;
pub use event_bus::EventBus;
