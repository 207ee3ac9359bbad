// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Modbus RTU framing for register reads and writes.
//!
//! All functions are `const` so fixed frames are built at compile time.

/// Unit address of the power station controller.
pub const UNIT_ADDRESS: u8 = 0x11;

const READ_HOLDING_REGISTERS: u8 = 0x03;
const WRITE_SINGLE_REGISTER: u8 = 0x06;

/// CRC-16/MODBUS (reflected polynomial `0xA001`, initial value `0xFFFF`).
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    let mut i = 0;
    while i < data.len() {
        crc ^= data[i] as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 0 {
                crc >> 1
            } else {
                (crc >> 1) ^ 0xA001
            };
            bit += 1;
        }
        i += 1;
    }
    crc
}

const fn frame(function: u8, register: u16, operand: u16) -> [u8; 8] {
    let [reg_hi, reg_lo] = register.to_be_bytes();
    let [op_hi, op_lo] = operand.to_be_bytes();
    let body = [UNIT_ADDRESS, function, reg_hi, reg_lo, op_hi, op_lo];
    // CRC goes on the wire low byte first
    let [crc_lo, crc_hi] = crc16(&body).to_le_bytes();
    [
        body[0], body[1], body[2], body[3], body[4], body[5], crc_lo, crc_hi,
    ]
}

/// Builds a "read holding registers" frame.
#[must_use]
pub const fn read_registers(start: u16, count: u16) -> [u8; 8] {
    frame(READ_HOLDING_REGISTERS, start, count)
}

/// Builds a "write single register" frame.
#[must_use]
pub const fn write_register(register: u16, value: u16) -> [u8; 8] {
    frame(WRITE_SINGLE_REGISTER, register, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_known_vectors() {
        assert_eq!(
            crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]).to_le_bytes(),
            [0xC5, 0xCD]
        );
        assert_eq!(
            crc16(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]).to_le_bytes(),
            [0x76, 0x87]
        );
    }

    #[test]
    fn crc_of_empty_input_is_init_value() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn read_frame_layout() {
        let frame = read_registers(0x006B, 3);
        assert_eq!(frame, [0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x76, 0x87]);
    }

    #[test]
    fn write_frame_layout() {
        let frame = write_register(26, 1);
        assert_eq!(&frame[..6], &[0x11, 0x06, 0x00, 0x1A, 0x00, 0x01]);

        let [lo, hi] = crc16(&frame[..6]).to_le_bytes();
        assert_eq!(frame[6], lo);
        assert_eq!(frame[7], hi);
    }

    #[test]
    fn frame_with_crc_checks_to_zero() {
        // Running the CRC over a frame including its CRC yields zero
        assert_eq!(crc16(&write_register(27, 3)), 0);
        assert_eq!(crc16(&read_registers(0, 80)), 0);
    }
}
