// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types.
//!
//! [`DeviceState`] holds the last-known values reported by a power station.
//! [`StateChange`] is a partial update decoded from one telemetry frame.
//!
//! # Examples
//!
//! ```
//! use powerstation_bridge::state::{DeviceState, SettingsReading, StateChange};
//!
//! let mut state = DeviceState::new();
//! state.apply(&StateChange::Settings(SettingsReading {
//!     maximum_charging_current: 5,
//!     ac_silent_charging: false,
//!     usb_standby_time: 0,
//!     ac_standby_time: 0,
//!     dc_standby_time: 0,
//!     screen_rest_time: 0,
//!     stop_charge_after: 0,
//!     discharge_lower_limit: 0,
//!     ac_charging_upper_limit: 1000,
//!     whole_machine_unused_time: 0,
//! }));
//!
//! assert_eq!(state.maximum_charging_current(), Some(5));
//! assert!(state.soc().is_none());
//! ```

mod device_state;
mod state_change;

pub use device_state::DeviceState;
pub use state_change::{OutputReading, SettingsReading, StateChange};
