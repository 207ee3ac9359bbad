// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live device telemetry over MQTT.
//!
//! Devices answer the `REGRequestSettings` poll with binary Modbus frames on
//! `<device_id>/device/response/client/<channel>`:
//!
//! - channel `04` carries the output snapshot (charge, power, output bits)
//! - channel `data` carries the settings snapshot
//!
//! [`decode_frame`] turns a frame into a [`StateChange`](crate::state::StateChange).
//! [`TelemetryChannel`] owns the connection, polls each device and merges
//! decoded frames into the [`DeviceRegistry`](crate::registry::DeviceRegistry).
//!
//! # Examples
//!
//! ```
//! use powerstation_bridge::telemetry::{decode_frame, FrameRejection};
//!
//! let topic = "AABBCC/device/response/client/04";
//! assert_eq!(decode_frame(topic, &[0; 20]), Err(FrameRejection::Length(7)));
//! ```

mod channel;
mod decoder;
mod poller;

pub use channel::{TelemetryChannel, TelemetryStats};
pub use decoder::{
    DecodedFrame, FRAME_WORDS, FrameKind, FrameRejection, HEADER_LEN, decode_frame, format_soc,
    to_words,
};
