// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary telemetry frame decoding.
//!
//! A frame is a 6-byte transport header followed by big-endian 16-bit
//! words. The client-response channel in the topic selects the frame kind:
//! channel `04` carries live outputs, channel `data` carries settings. Both
//! kinds are exactly [`FRAME_WORDS`] words long.

use std::fmt;

use crate::protocol::parse_client_response_topic;
use crate::state::{OutputReading, SettingsReading, StateChange};

/// Bytes skipped at the start of every frame.
pub const HEADER_LEN: usize = 6;

/// Number of words in every recognized frame.
pub const FRAME_WORDS: usize = 81;

const OUTPUTS_CHANNEL: &str = "04";
const SETTINGS_CHANNEL: &str = "data";

// Word offsets in an outputs frame
const TOTAL_INPUT: usize = 6;
const TOTAL_OUTPUT: usize = 39;
const ACTIVE_OUTPUTS: usize = 41;
const STATE_OF_CHARGE: usize = 56;

// Bit positions in the active-outputs word, counted from the MSB
const LED_BIT: u32 = 3;
const AC_BIT: u32 = 4;
const DC_BIT: u32 = 5;
const USB_BIT: u32 = 6;

// Word offsets in a settings frame
const MAXIMUM_CHARGING_CURRENT: usize = 20;
const AC_SILENT_CHARGING: usize = 57;
const USB_STANDBY_TIME: usize = 59;
const AC_STANDBY_TIME: usize = 60;
const DC_STANDBY_TIME: usize = 61;
const SCREEN_REST_TIME: usize = 62;
const STOP_CHARGE_AFTER: usize = 63;
const DISCHARGE_LOWER_LIMIT: usize = 66;
const AC_CHARGING_UPPER_LIMIT: usize = 67;
const WHOLE_MACHINE_UNUSED_TIME: usize = 68;

/// The two recognized frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Live outputs, power flow and state of charge.
    Outputs,
    /// Charging and standby settings.
    Settings,
}

impl FrameKind {
    /// Maps a client-response channel to a frame kind.
    #[must_use]
    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel {
            OUTPUTS_CHANNEL => Some(Self::Outputs),
            SETTINGS_CHANNEL => Some(Self::Settings),
            _ => None,
        }
    }
}

/// A successfully decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Device id taken from the topic.
    pub device_id: String,
    /// Fields carried by the frame.
    pub change: StateChange,
}

/// Why a frame was not decoded.
///
/// Rejections are expected: devices emit frame kinds the connector does not
/// understand. They are counted, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRejection {
    /// The topic is not a client-response channel.
    Topic,
    /// The client-response channel is not a recognized frame kind.
    Channel(String),
    /// The frame has the wrong number of words.
    Length(usize),
}

impl fmt::Display for FrameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic => f.write_str("not a client-response topic"),
            Self::Channel(channel) => write!(f, "unknown channel {channel}"),
            Self::Length(words) => write!(f, "{words} words, expected {FRAME_WORDS}"),
        }
    }
}

/// Groups the payload after the header into big-endian words.
///
/// A trailing odd byte becomes the high byte of a final word.
#[must_use]
pub fn to_words(payload: &[u8]) -> Vec<u16> {
    payload
        .get(HEADER_LEN..)
        .unwrap_or_default()
        .chunks(2)
        .map(|pair| match *pair {
            [high, low] => u16::from_be_bytes([high, low]),
            [high] => u16::from_be_bytes([high, 0]),
            _ => 0,
        })
        .collect()
}

/// Formats a state-of-charge word (tenths of a percent) with one decimal.
///
/// # Examples
///
/// ```
/// use powerstation_bridge::telemetry::format_soc;
///
/// assert_eq!(format_soc(823), "82.3");
/// assert_eq!(format_soc(1000), "100.0");
/// assert_eq!(format_soc(5), "0.5");
/// ```
#[must_use]
pub fn format_soc(word: u16) -> String {
    format!("{}.{}", word / 10, word % 10)
}

fn bit(word: u16, position_from_msb: u32) -> bool {
    word & (0x8000 >> position_from_msb) != 0
}

fn outputs(words: &[u16]) -> OutputReading {
    let active = words[ACTIVE_OUTPUTS];
    OutputReading {
        soc: format_soc(words[STATE_OF_CHARGE]),
        total_input: words[TOTAL_INPUT],
        total_output: words[TOTAL_OUTPUT],
        usb_output: bit(active, USB_BIT),
        dc_output: bit(active, DC_BIT),
        ac_output: bit(active, AC_BIT),
        led_output: bit(active, LED_BIT),
    }
}

fn settings(words: &[u16]) -> SettingsReading {
    SettingsReading {
        maximum_charging_current: words[MAXIMUM_CHARGING_CURRENT],
        ac_silent_charging: words[AC_SILENT_CHARGING] == 1,
        usb_standby_time: words[USB_STANDBY_TIME],
        ac_standby_time: words[AC_STANDBY_TIME],
        dc_standby_time: words[DC_STANDBY_TIME],
        screen_rest_time: words[SCREEN_REST_TIME],
        stop_charge_after: words[STOP_CHARGE_AFTER],
        discharge_lower_limit: words[DISCHARGE_LOWER_LIMIT],
        ac_charging_upper_limit: words[AC_CHARGING_UPPER_LIMIT],
        whole_machine_unused_time: words[WHOLE_MACHINE_UNUSED_TIME],
    }
}

/// Decodes an inbound MQTT message.
///
/// # Errors
///
/// Returns a [`FrameRejection`] for any topic or length that does not match
/// a recognized frame kind.
pub fn decode_frame(topic: &str, payload: &[u8]) -> Result<DecodedFrame, FrameRejection> {
    let (device_id, channel) = parse_client_response_topic(topic).ok_or(FrameRejection::Topic)?;
    let kind =
        FrameKind::from_channel(channel).ok_or_else(|| FrameRejection::Channel(channel.to_string()))?;

    let words = to_words(payload);
    if words.len() != FRAME_WORDS {
        return Err(FrameRejection::Length(words.len()));
    }

    let change = match kind {
        FrameKind::Outputs => StateChange::Outputs(outputs(&words)),
        FrameKind::Settings => StateChange::Settings(settings(&words)),
    };

    Ok(DecodedFrame {
        device_id: device_id.to_string(),
        change,
    })
}
