// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last-known state of a power station.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::StateChange;

/// Tracked state of a power station.
///
/// All known fields are optional because nothing is known until the device
/// reports it. Fields the connector does not understand, such as the raw
/// cloud device record, are kept in [`extra`](Self::extra) and serialized
/// alongside the known ones.
///
/// Updates are overlays: a field is only ever replaced by a newer value,
/// never cleared.
///
/// # Examples
///
/// ```
/// use powerstation_bridge::state::DeviceState;
///
/// let state = DeviceState::new();
/// assert!(state.soc().is_none());
/// assert!(state.ac_output().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    soc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_input: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_output: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ac_output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dc_output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usb_output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    led_output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maximum_charging_current: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ac_silent_charging: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usb_standby_time: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ac_standby_time: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dc_standby_time: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    screen_rest_time: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop_charge_after: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    discharge_lower_limit: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ac_charging_upper_limit: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    whole_machine_unused_time: Option<u16>,
    /// Pass-through fields not decoded by the connector.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Serialized names of the decoded fields.
const FIELD_NAMES: [&str; 17] = [
    "soc",
    "totalInput",
    "totalOutput",
    "acOutput",
    "dcOutput",
    "usbOutput",
    "ledOutput",
    "maximumChargingCurrent",
    "acSilentCharging",
    "usbStandbyTime",
    "acStandbyTime",
    "dcStandbyTime",
    "screenRestTime",
    "stopChargeAfter",
    "dischargeLowerLimit",
    "acChargingUpperLimit",
    "wholeMachineUnusedTime",
];

/// Assigns `$value` to `$self.$field` if it differs, flagging `$changed`.
macro_rules! set_field {
    ($self:ident, $changed:ident, $field:ident, $value:expr) => {
        let value = Some($value);
        if $self.$field != value {
            $self.$field = value;
            $changed = true;
        }
    };
}

/// Overlays `$other.$field` onto `$self.$field` when it is known.
macro_rules! overlay_field {
    ($self:ident, $other:ident, $changed:ident, $($field:ident),+ $(,)?) => {
        $(
            if $other.$field.is_some() && $self.$field != $other.$field {
                $self.$field.clone_from(&$other.$field);
                $changed = true;
            }
        )+
    };
}

impl DeviceState {
    /// Creates a new empty device state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from a raw cloud device record.
    ///
    /// Keys matching known fields are decoded; everything else lands in
    /// [`extra`](Self::extra). A known key whose value has the wrong type is
    /// dropped, so it can never shadow a decoded field later.
    #[must_use]
    pub fn from_record(mut record: Map<String, Value>) -> Self {
        if let Ok(state) = serde_json::from_value(Value::Object(record.clone())) {
            return state;
        }

        record.retain(|key, value| {
            if !FIELD_NAMES.contains(&key.as_str()) {
                return true;
            }
            let single = Map::from_iter([(key.clone(), value.clone())]);
            let fits = serde_json::from_value::<Self>(Value::Object(single)).is_ok();
            if !fits {
                tracing::debug!(field = %key, "Mistyped device record field dropped");
            }
            fits
        });

        match serde_json::from_value(Value::Object(record.clone())) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(error = %e, "Device record kept as pass-through fields");
                record.retain(|key, _| !FIELD_NAMES.contains(&key.as_str()));
                Self {
                    extra: record,
                    ..Self::default()
                }
            }
        }
    }

    // ========== Outputs ==========

    /// State of charge, e.g. `"82.3"`.
    #[must_use]
    pub fn soc(&self) -> Option<&str> {
        self.soc.as_deref()
    }

    /// Input power in watts.
    #[must_use]
    pub fn total_input(&self) -> Option<u16> {
        self.total_input
    }

    /// Output power in watts.
    #[must_use]
    pub fn total_output(&self) -> Option<u16> {
        self.total_output
    }

    /// Whether the AC output is on.
    #[must_use]
    pub fn ac_output(&self) -> Option<bool> {
        self.ac_output
    }

    /// Whether the DC output is on.
    #[must_use]
    pub fn dc_output(&self) -> Option<bool> {
        self.dc_output
    }

    /// Whether the USB output is on.
    #[must_use]
    pub fn usb_output(&self) -> Option<bool> {
        self.usb_output
    }

    /// Whether the LED light is on.
    #[must_use]
    pub fn led_output(&self) -> Option<bool> {
        self.led_output
    }

    // ========== Settings ==========

    /// Maximum AC charging current.
    #[must_use]
    pub fn maximum_charging_current(&self) -> Option<u16> {
        self.maximum_charging_current
    }

    /// Whether silent AC charging is on.
    #[must_use]
    pub fn ac_silent_charging(&self) -> Option<bool> {
        self.ac_silent_charging
    }

    /// USB output standby timeout.
    #[must_use]
    pub fn usb_standby_time(&self) -> Option<u16> {
        self.usb_standby_time
    }

    /// AC output standby timeout.
    #[must_use]
    pub fn ac_standby_time(&self) -> Option<u16> {
        self.ac_standby_time
    }

    /// DC output standby timeout.
    #[must_use]
    pub fn dc_standby_time(&self) -> Option<u16> {
        self.dc_standby_time
    }

    /// Screen timeout.
    #[must_use]
    pub fn screen_rest_time(&self) -> Option<u16> {
        self.screen_rest_time
    }

    /// Charge limit that stops charging.
    #[must_use]
    pub fn stop_charge_after(&self) -> Option<u16> {
        self.stop_charge_after
    }

    /// Discharge lower limit.
    #[must_use]
    pub fn discharge_lower_limit(&self) -> Option<u16> {
        self.discharge_lower_limit
    }

    /// AC charging upper limit.
    #[must_use]
    pub fn ac_charging_upper_limit(&self) -> Option<u16> {
        self.ac_charging_upper_limit
    }

    /// Idle time before the device powers off.
    #[must_use]
    pub fn whole_machine_unused_time(&self) -> Option<u16> {
        self.whole_machine_unused_time
    }

    /// Pass-through fields, such as the raw cloud device record.
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Applies a decoded change and returns `true` if any field changed.
    ///
    /// Fields outside the change's frame kind are left untouched.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        let mut changed = false;

        match change {
            StateChange::Outputs(r) => {
                set_field!(self, changed, soc, r.soc.clone());
                set_field!(self, changed, total_input, r.total_input);
                set_field!(self, changed, total_output, r.total_output);
                set_field!(self, changed, usb_output, r.usb_output);
                set_field!(self, changed, dc_output, r.dc_output);
                set_field!(self, changed, ac_output, r.ac_output);
                set_field!(self, changed, led_output, r.led_output);
            }
            StateChange::Settings(r) => {
                set_field!(self, changed, maximum_charging_current, r.maximum_charging_current);
                set_field!(self, changed, ac_silent_charging, r.ac_silent_charging);
                set_field!(self, changed, usb_standby_time, r.usb_standby_time);
                set_field!(self, changed, ac_standby_time, r.ac_standby_time);
                set_field!(self, changed, dc_standby_time, r.dc_standby_time);
                set_field!(self, changed, screen_rest_time, r.screen_rest_time);
                set_field!(self, changed, stop_charge_after, r.stop_charge_after);
                set_field!(self, changed, discharge_lower_limit, r.discharge_lower_limit);
                set_field!(self, changed, ac_charging_upper_limit, r.ac_charging_upper_limit);
                set_field!(
                    self,
                    changed,
                    whole_machine_unused_time,
                    r.whole_machine_unused_time
                );
            }
        }

        changed
    }

    /// Overlays every known field of `other` onto this state.
    ///
    /// Unknown fields of `other` are unioned into [`extra`](Self::extra).
    /// Returns `true` if anything changed.
    pub fn overlay(&mut self, other: &DeviceState) -> bool {
        let mut changed = false;

        overlay_field!(
            self,
            other,
            changed,
            soc,
            total_input,
            total_output,
            ac_output,
            dc_output,
            usb_output,
            led_output,
            maximum_charging_current,
            ac_silent_charging,
            usb_standby_time,
            ac_standby_time,
            dc_standby_time,
            screen_rest_time,
            stop_charge_after,
            discharge_lower_limit,
            ac_charging_upper_limit,
            whole_machine_unused_time,
        );

        for (key, value) in &other.extra {
            if self.extra.get(key) != Some(value) {
                self.extra.insert(key.clone(), value.clone());
                changed = true;
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::{OutputReading, SettingsReading};

    fn outputs() -> StateChange {
        StateChange::Outputs(OutputReading {
            soc: "82.3".to_string(),
            total_input: 0,
            total_output: 120,
            usb_output: true,
            dc_output: false,
            ac_output: true,
            led_output: false,
        })
    }

    fn settings() -> StateChange {
        StateChange::Settings(SettingsReading {
            maximum_charging_current: 5,
            ac_silent_charging: true,
            usb_standby_time: 1,
            ac_standby_time: 2,
            dc_standby_time: 3,
            screen_rest_time: 4,
            stop_charge_after: 5,
            discharge_lower_limit: 100,
            ac_charging_upper_limit: 1000,
            whole_machine_unused_time: 6,
        })
    }

    #[test]
    fn new_state_is_empty() {
        let state = DeviceState::new();
        assert!(state.soc().is_none());
        assert!(state.usb_output().is_none());
        assert!(state.maximum_charging_current().is_none());
        assert!(state.extra().is_empty());
    }

    #[test]
    fn apply_outputs() {
        let mut state = DeviceState::new();

        assert!(state.apply(&outputs()));
        assert_eq!(state.soc(), Some("82.3"));
        assert_eq!(state.total_output(), Some(120));
        assert_eq!(state.usb_output(), Some(true));
        assert_eq!(state.dc_output(), Some(false));

        // Applying the same reading again is not a change
        assert!(!state.apply(&outputs()));
    }

    #[test]
    fn settings_after_outputs_preserves_outputs() {
        let mut state = DeviceState::new();
        state.apply(&outputs());
        state.apply(&settings());

        assert_eq!(state.soc(), Some("82.3"));
        assert_eq!(state.ac_output(), Some(true));
        assert_eq!(state.usb_output(), Some(true));
        assert_eq!(state.dc_output(), Some(false));
        assert_eq!(state.led_output(), Some(false));
        assert_eq!(state.maximum_charging_current(), Some(5));
        assert_eq!(state.ac_silent_charging(), Some(true));
        assert_eq!(state.usb_standby_time(), Some(1));
        assert_eq!(state.ac_standby_time(), Some(2));
        assert_eq!(state.dc_standby_time(), Some(3));
        assert_eq!(state.screen_rest_time(), Some(4));
        assert_eq!(state.stop_charge_after(), Some(5));
        assert_eq!(state.discharge_lower_limit(), Some(100));
        assert_eq!(state.ac_charging_upper_limit(), Some(1000));
        assert_eq!(state.whole_machine_unused_time(), Some(6));
    }

    #[test]
    fn order_of_frame_kinds_does_not_matter() {
        let mut a = DeviceState::new();
        a.apply(&outputs());
        a.apply(&settings());

        let mut b = DeviceState::new();
        b.apply(&settings());
        b.apply(&outputs());

        assert_eq!(a, b);
    }

    #[test]
    fn from_record_keeps_unknown_keys() {
        let record = json!({ "device_id": "AABB", "device_name": "F2400", "soc": "50.0" });
        let Value::Object(map) = record else {
            unreachable!()
        };

        let state = DeviceState::from_record(map);
        assert_eq!(state.soc(), Some("50.0"));
        assert_eq!(state.extra()["device_name"], "F2400");
    }

    #[test]
    fn from_record_drops_mistyped_known_fields() {
        let Value::Object(map) = json!({ "soc": 50, "acOutput": true, "device_id": "AABB" }) else {
            unreachable!()
        };

        let state = DeviceState::from_record(map);
        assert!(state.soc().is_none());
        assert_eq!(state.ac_output(), Some(true));
        assert!(!state.extra().contains_key("soc"));
        assert_eq!(state.extra()["device_id"], "AABB");
    }

    #[test]
    fn mistyped_record_field_never_shadows_telemetry() {
        let Value::Object(map) = json!({ "soc": 50, "device_id": "AABB" }) else {
            unreachable!()
        };
        let mut state = DeviceState::from_record(map);
        state.apply(&outputs());

        let text = serde_json::to_string(&state).unwrap();
        assert_eq!(text.matches("\"soc\"").count(), 1);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["soc"], "82.3");
    }

    #[test]
    fn field_names_match_serialized_keys() {
        let mut state = DeviceState::new();
        state.apply(&outputs());
        state.apply(&settings());

        let Value::Object(map) = serde_json::to_value(&state).unwrap() else {
            unreachable!()
        };
        let mut keys: Vec<_> = map.keys().map(String::as_str).collect();
        let mut names = FIELD_NAMES.to_vec();
        keys.sort_unstable();
        names.sort_unstable();
        assert_eq!(keys, names);
    }

    #[test]
    fn overlay_unions_fields() {
        let mut base = DeviceState::new();
        base.apply(&outputs());

        let Value::Object(map) = json!({ "device_name": "F2400" }) else {
            unreachable!()
        };
        let other = DeviceState::from_record(map);

        assert!(base.overlay(&other));
        assert_eq!(base.soc(), Some("82.3"));
        assert_eq!(base.extra()["device_name"], "F2400");
        assert!(!base.overlay(&other));
    }

    #[test]
    fn serializes_flat_camel_case() {
        let mut state = DeviceState::new();
        state.apply(&outputs());
        let Value::Object(map) = json!({ "device_id": "AABB" }) else {
            unreachable!()
        };
        state.overlay(&DeviceState::from_record(map));

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["soc"], "82.3");
        assert_eq!(value["acOutput"], true);
        assert_eq!(value["device_id"], "AABB");
        assert!(value.get("maximumChargingCurrent").is_none());
    }
}
