// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Partial updates decoded from telemetry frames.
//!
//! Each frame kind reports a fixed subset of [`DeviceState`](super::DeviceState)
//! fields. A [`StateChange`] carries exactly that subset; applying it leaves
//! every other field untouched.
//!
//! # Examples
//!
//! ```
//! use powerstation_bridge::state::{DeviceState, OutputReading, StateChange};
//!
//! let mut state = DeviceState::new();
//! let change = StateChange::Outputs(OutputReading {
//!     soc: "82.3".to_string(),
//!     total_input: 0,
//!     total_output: 120,
//!     usb_output: false,
//!     dc_output: false,
//!     ac_output: true,
//!     led_output: false,
//! });
//!
//! assert!(state.apply(&change));
//! assert_eq!(state.ac_output(), Some(true));
//! ```

use serde::{Deserialize, Serialize};

/// Live readings carried by a state frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputReading {
    /// State of charge with one decimal digit, e.g. `"82.3"`.
    pub soc: String,
    /// Input power in watts.
    pub total_input: u16,
    /// Output power in watts.
    pub total_output: u16,
    /// USB output switch.
    pub usb_output: bool,
    /// DC output switch.
    pub dc_output: bool,
    /// AC output switch.
    pub ac_output: bool,
    /// LED light switch.
    pub led_output: bool,
}

/// Configuration values carried by a settings frame.
///
/// Values are raw register contents; units depend on the device model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsReading {
    /// Maximum AC charging current.
    pub maximum_charging_current: u16,
    /// Whether silent AC charging is on.
    pub ac_silent_charging: bool,
    /// USB output standby timeout.
    pub usb_standby_time: u16,
    /// AC output standby timeout.
    pub ac_standby_time: u16,
    /// DC output standby timeout.
    pub dc_standby_time: u16,
    /// Screen timeout.
    pub screen_rest_time: u16,
    /// Charge limit that stops charging.
    pub stop_charge_after: u16,
    /// Discharge lower limit.
    pub discharge_lower_limit: u16,
    /// AC charging upper limit.
    pub ac_charging_upper_limit: u16,
    /// Idle time before the device powers off.
    pub whole_machine_unused_time: u16,
}

/// A partial update to a device's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    /// Output switches, power flow and state of charge.
    Outputs(OutputReading),
    /// Charging and standby settings.
    Settings(SettingsReading),
}

impl StateChange {
    /// Returns a short label for the frame kind that produced this change.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Outputs(_) => "outputs",
            Self::Settings(_) => "settings",
        }
    }
}
