// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On/off switches for the four outputs of a power station.
//!
//! This is the surface an accessory layer binds to: each [`Output`] is one
//! switch, read from the registry and written through a command.

use std::fmt;
use std::sync::Arc;

use crate::command::CommandAck;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::registry::normalize_device_id;
use crate::state::DeviceState;

/// A switchable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    /// AC inverter.
    Ac,
    /// 12 V DC ports.
    Dc,
    /// USB ports.
    Usb,
    /// Built-in light, switched between always-on and off.
    Led,
}

impl Output {
    /// All outputs.
    pub const ALL: [Self; 4] = [Self::Ac, Self::Dc, Self::Usb, Self::Led];

    /// Returns the command that switches this output on or off.
    ///
    /// # Examples
    ///
    /// ```
    /// use powerstation_bridge::Output;
    ///
    /// assert_eq!(Output::Ac.command(true), "REGEnableACOutput");
    /// assert_eq!(Output::Led.command(false), "REGDisableLED");
    /// ```
    #[must_use]
    pub const fn command(self, on: bool) -> &'static str {
        match (self, on) {
            (Self::Ac, true) => "REGEnableACOutput",
            (Self::Ac, false) => "REGDisableACOutput",
            (Self::Dc, true) => "REGEnableDCOutput",
            (Self::Dc, false) => "REGDisableDCOutput",
            (Self::Usb, true) => "REGEnableUSBOutput",
            (Self::Usb, false) => "REGDisableUSBOutput",
            (Self::Led, true) => "REGEnableLEDAlways",
            (Self::Led, false) => "REGDisableLED",
        }
    }

    /// Reads this output from a device state, `None` if not yet reported.
    #[must_use]
    pub fn read(self, state: &DeviceState) -> Option<bool> {
        match self {
            Self::Ac => state.ac_output(),
            Self::Dc => state.dc_output(),
            Self::Usb => state.usb_output(),
            Self::Led => state.led_output(),
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ac => "ac",
            Self::Dc => "dc",
            Self::Usb => "usb",
            Self::Led => "led",
        })
    }
}

/// Controller for the outputs of one device.
///
/// Connects the shared [`Connector`] on first use.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use powerstation_bridge::{Connector, ConnectorConfig, Output, PowerStation};
///
/// #[tokio::main]
/// async fn main() -> powerstation_bridge::Result<()> {
///     let connector = Arc::new(Connector::new(ConnectorConfig::new("user@example.com", "secret"))?);
///     let station = PowerStation::new(connector, "7C:2C:67:AB:5F:0E");
///
///     station.set_output(Output::Usb, true).await?;
///     println!("usb on: {}", station.output_enabled(Output::Usb).await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PowerStation {
    connector: Arc<Connector>,
    device_id: String,
}

impl PowerStation {
    /// Creates a controller for `device_id`.
    #[must_use]
    pub fn new(connector: Arc<Connector>, device_id: &str) -> Self {
        Self {
            connector,
            device_id: normalize_device_id(device_id),
        }
    }

    /// Returns the normalized device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Switches an output on or off.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the connector cannot be connected, or
    /// [`Error::Command`] if the command cannot be published.
    pub async fn set_output(&self, output: Output, on: bool) -> Result<CommandAck> {
        self.connector.ensure_connected().await?;

        let ack = self
            .connector
            .run_command(&self.device_id, output.command(on), None)
            .await?;

        tracing::debug!(device = %self.device_id, output = %output, on, "Output switched");
        Ok(ack)
    }

    /// Returns the last reported state of an output.
    ///
    /// An output that has not been reported yet reads as off.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the connector cannot be connected, or
    /// [`Error::DeviceNotFound`] if the account has no such device.
    pub async fn output_enabled(&self, output: Output) -> Result<bool> {
        self.connector.ensure_connected().await?;

        let state = self
            .connector
            .get_device_by_id(&self.device_id)
            .ok_or_else(|| Error::DeviceNotFound(self.device_id.clone()))?;

        Ok(output.read(&state).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Register;
    use crate::state::{OutputReading, StateChange};

    #[test]
    fn every_output_command_is_registered() {
        for output in Output::ALL {
            for on in [true, false] {
                let register = Register::lookup(output.command(on));
                assert!(register.is_some(), "{output} {on}");
                assert!(!register.unwrap().takes_value());
            }
        }
    }

    #[test]
    fn read_maps_each_output_to_its_field() {
        let mut state = DeviceState::new();
        assert_eq!(Output::Ac.read(&state), None);

        state.apply(&StateChange::Outputs(OutputReading {
            soc: "50.0".to_string(),
            total_input: 0,
            total_output: 0,
            usb_output: true,
            dc_output: false,
            ac_output: true,
            led_output: false,
        }));

        assert_eq!(Output::Ac.read(&state), Some(true));
        assert_eq!(Output::Dc.read(&state), Some(false));
        assert_eq!(Output::Usb.read(&state), Some(true));
        assert_eq!(Output::Led.read(&state), Some(false));
    }

    #[test]
    fn display_names() {
        let names: Vec<_> = Output::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["ac", "dc", "usb", "led"]);
    }

    #[test]
    fn power_station_normalizes_id() {
        let connector = Connector::new(crate::ConnectorConfig::new("u", "p")).unwrap();
        let station = PowerStation::new(Arc::new(connector), "AA:BB-CC");
        assert_eq!(station.device_id(), "AABBCC");
    }
}
