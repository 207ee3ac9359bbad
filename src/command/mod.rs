// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Named device commands.
//!
//! Every command is a [`Register`]: either a fixed frame or a function that
//! encodes an optional value into a frame. The table is closed and known at
//! compile time.
//!
//! # Available Commands
//!
//! | Command | Kind | Effect |
//! |---------|------|--------|
//! | `REGRequestSettings` | fixed | Read registers 0..80, triggers telemetry |
//! | `REGEnableUSBOutput` / `REGDisableUSBOutput` | fixed | Register 24 |
//! | `REGEnableDCOutput` / `REGDisableDCOutput` | fixed | Register 25 |
//! | `REGEnableACOutput` / `REGDisableACOutput` | fixed | Register 26 |
//! | `REGEnableLEDAlways` / `REGEnableLEDSOS` / `REGEnableLEDFlash` / `REGDisableLED` | fixed | Register 27 |
//! | `REGMaximumChargingCurrent` | value | Register 20 |
//! | `REGACSilentCharging` | value (bool) | Register 57 |
//! | `REGUSBStandbyTime` .. `REGStopChargeAfter` | value | Registers 59..63 |
//! | `REGDischargeLowerLimit` / `REGACChargingUpperLimit` / `REGWholeMachineUnusedTime` | value | Registers 66..68 |
//!
//! # Examples
//!
//! ```
//! use powerstation_bridge::command::Register;
//!
//! let register = Register::lookup("REGEnableACOutput").unwrap();
//! let frame = register.encode(None).unwrap();
//! assert_eq!(&frame[..6], &[0x11, 0x06, 0x00, 0x1A, 0x00, 0x01]);
//!
//! let register = Register::lookup("REGStopChargeAfter").unwrap();
//! assert!(register.encode(None).is_err());
//! assert!(register.encode(Some("60")).is_ok());
//! ```

mod dispatcher;
pub mod modbus;

pub use dispatcher::{CommandAck, CommandDispatcher};

use std::fmt;

use crate::error::ValueError;

/// Name of the polling command that makes a device report its state.
pub const REQUEST_SETTINGS: &str = "REGRequestSettings";

/// Encodes an optional string value into a frame.
pub type FrameEncoder = fn(Option<&str>) -> Result<Vec<u8>, ValueError>;

/// How a named command becomes bytes on the wire.
#[derive(Clone, Copy)]
pub enum Register {
    /// A predefined frame, published verbatim.
    Fixed(&'static [u8]),
    /// A frame built from the caller's value.
    Parameterized(FrameEncoder),
}

impl Register {
    /// Looks up a command by name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        REGISTERS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, register)| *register)
    }

    /// Produces the frame for this register.
    ///
    /// Fixed registers ignore `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] if a parameterized register rejects the value.
    pub fn encode(&self, value: Option<&str>) -> Result<Vec<u8>, ValueError> {
        match self {
            Self::Fixed(frame) => Ok(frame.to_vec()),
            Self::Parameterized(encode) => encode(value),
        }
    }

    /// Returns `true` for parameterized registers.
    #[must_use]
    pub fn takes_value(&self) -> bool {
        matches!(self, Self::Parameterized(_))
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(frame) => f.debug_tuple("Fixed").field(frame).finish(),
            Self::Parameterized(_) => f.write_str("Parameterized"),
        }
    }
}

/// The frame published by [`REQUEST_SETTINGS`].
#[must_use]
pub fn request_settings_frame() -> &'static [u8] {
    &SETTINGS_REQUEST
}

/// Returns the names of all known commands.
pub fn command_names() -> impl Iterator<Item = &'static str> {
    REGISTERS.iter().map(|(name, _)| *name)
}

const SETTINGS_REQUEST: [u8; 8] = modbus::read_registers(0, 80);
const USB_ON: [u8; 8] = modbus::write_register(24, 1);
const USB_OFF: [u8; 8] = modbus::write_register(24, 0);
const DC_ON: [u8; 8] = modbus::write_register(25, 1);
const DC_OFF: [u8; 8] = modbus::write_register(25, 0);
const AC_ON: [u8; 8] = modbus::write_register(26, 1);
const AC_OFF: [u8; 8] = modbus::write_register(26, 0);
const LED_ALWAYS: [u8; 8] = modbus::write_register(27, 1);
const LED_SOS: [u8; 8] = modbus::write_register(27, 2);
const LED_FLASH: [u8; 8] = modbus::write_register(27, 3);
const LED_OFF: [u8; 8] = modbus::write_register(27, 0);

static REGISTERS: &[(&str, Register)] = &[
    (REQUEST_SETTINGS, Register::Fixed(&SETTINGS_REQUEST)),
    ("REGEnableUSBOutput", Register::Fixed(&USB_ON)),
    ("REGDisableUSBOutput", Register::Fixed(&USB_OFF)),
    ("REGEnableDCOutput", Register::Fixed(&DC_ON)),
    ("REGDisableDCOutput", Register::Fixed(&DC_OFF)),
    ("REGEnableACOutput", Register::Fixed(&AC_ON)),
    ("REGDisableACOutput", Register::Fixed(&AC_OFF)),
    ("REGEnableLEDAlways", Register::Fixed(&LED_ALWAYS)),
    ("REGEnableLEDSOS", Register::Fixed(&LED_SOS)),
    ("REGEnableLEDFlash", Register::Fixed(&LED_FLASH)),
    ("REGDisableLED", Register::Fixed(&LED_OFF)),
    ("REGMaximumChargingCurrent", Register::Parameterized(write_u16::<20>)),
    ("REGACSilentCharging", Register::Parameterized(write_bool::<57>)),
    ("REGUSBStandbyTime", Register::Parameterized(write_u16::<59>)),
    ("REGACStandbyTime", Register::Parameterized(write_u16::<60>)),
    ("REGDCStandbyTime", Register::Parameterized(write_u16::<61>)),
    ("REGScreenRestTime", Register::Parameterized(write_u16::<62>)),
    ("REGStopChargeAfter", Register::Parameterized(write_u16::<63>)),
    ("REGDischargeLowerLimit", Register::Parameterized(write_u16::<66>)),
    ("REGACChargingUpperLimit", Register::Parameterized(write_u16::<67>)),
    ("REGWholeMachineUnusedTime", Register::Parameterized(write_u16::<68>)),
];

fn required(value: Option<&str>) -> Result<&str, ValueError> {
    let value = value.map(str::trim).ok_or(ValueError::Missing)?;
    if value.is_empty() {
        return Err(ValueError::Missing);
    }
    Ok(value)
}

fn write_u16<const REGISTER: u16>(value: Option<&str>) -> Result<Vec<u8>, ValueError> {
    let raw = required(value)?;
    let value = raw
        .parse::<u16>()
        .map_err(|_| ValueError::Invalid(raw.to_string()))?;
    Ok(modbus::write_register(REGISTER, value).to_vec())
}

fn write_bool<const REGISTER: u16>(value: Option<&str>) -> Result<Vec<u8>, ValueError> {
    let raw = required(value)?;
    let flag = match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => 1,
        "0" | "false" | "off" => 0,
        _ => return Err(ValueError::Invalid(raw.to_string())),
    };
    Ok(modbus::write_register(REGISTER, flag).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_is_unique() {
        let mut names: Vec<_> = command_names().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 21);
    }

    #[test]
    fn unknown_command() {
        assert!(Register::lookup("REGSelfDestruct").is_none());
        assert!(Register::lookup("regenableacoutput").is_none());
    }

    #[test]
    fn request_settings_reads_80_registers() {
        let frame = Register::lookup(REQUEST_SETTINGS)
            .unwrap()
            .encode(None)
            .unwrap();
        assert_eq!(&frame[..6], &[0x11, 0x03, 0x00, 0x00, 0x00, 0x50]);
        assert_eq!(frame.len(), 8);
    }

    #[test]
    fn fixed_frames_ignore_value() {
        let register = Register::lookup("REGDisableDCOutput").unwrap();
        assert!(!register.takes_value());
        assert_eq!(
            register.encode(Some("whatever")).unwrap(),
            register.encode(None).unwrap()
        );
    }

    #[test]
    fn led_modes() {
        let value_of = |name: &str| Register::lookup(name).unwrap().encode(None).unwrap()[5];
        assert_eq!(value_of("REGEnableLEDAlways"), 1);
        assert_eq!(value_of("REGEnableLEDSOS"), 2);
        assert_eq!(value_of("REGEnableLEDFlash"), 3);
        assert_eq!(value_of("REGDisableLED"), 0);
    }

    #[test]
    fn parameterized_value_encoding() {
        let register = Register::lookup("REGACChargingUpperLimit").unwrap();
        assert!(register.takes_value());

        let frame = register.encode(Some(" 1000 ")).unwrap();
        assert_eq!(&frame[..6], &[0x11, 0x06, 0x00, 67, 0x03, 0xE8]);
        assert_eq!(modbus::crc16(&frame), 0);
    }

    #[test]
    fn parameterized_rejects_missing_or_invalid() {
        let register = Register::lookup("REGMaximumChargingCurrent").unwrap();
        assert_eq!(register.encode(None), Err(ValueError::Missing));
        assert_eq!(register.encode(Some("")), Err(ValueError::Missing));
        assert_eq!(
            register.encode(Some("70000")),
            Err(ValueError::Invalid("70000".to_string()))
        );
        assert_eq!(
            register.encode(Some("-1")),
            Err(ValueError::Invalid("-1".to_string()))
        );
    }

    #[test]
    fn silent_charging_accepts_booleans() {
        let register = Register::lookup("REGACSilentCharging").unwrap();
        assert_eq!(register.encode(Some("true")).unwrap()[5], 1);
        assert_eq!(register.encode(Some("0")).unwrap()[5], 0);
        assert_eq!(register.encode(Some("OFF")).unwrap()[5], 0);
        assert!(register.encode(Some("maybe")).is_err());
    }
}
