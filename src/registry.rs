// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory registry of last-known device state.
//!
//! The registry is the single source of truth for device state. Telemetry
//! writes into it; command and query callers read from it.
//!
//! Entries are stored as `Arc<DeviceState>`. Every update clones the current
//! record, overlays the change and swaps the new `Arc` in under the write
//! lock, so a reader always holds a complete record, never a half-merged one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::event::{DeviceEvent, EventBus};
use crate::state::{DeviceState, StateChange};

/// Strips the `:` and `-` separators from a device MAC address.
///
/// # Examples
///
/// ```
/// use powerstation_bridge::registry::normalize_device_id;
///
/// assert_eq!(normalize_device_id("7C:2C:67:AB:5F:0E"), "7C2C67AB5F0E");
/// assert_eq!(normalize_device_id("7c-2c-67"), "7c2c67");
/// ```
#[must_use]
pub fn normalize_device_id(id: &str) -> String {
    id.chars().filter(|c| !matches!(c, ':' | '-')).collect()
}

/// Observable map from normalized device id to last-known state.
///
/// Cloning is cheap and yields a handle to the same registry.
///
/// # Examples
///
/// ```
/// use powerstation_bridge::registry::DeviceRegistry;
///
/// let registry = DeviceRegistry::new();
/// registry.ensure("7C:2C:67:AB:5F:0E");
///
/// assert!(registry.get("7C2C67AB5F0E").is_some());
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<String, Arc<DeviceState>>>>,
    event_bus: EventBus,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to registry events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_bus.subscribe()
    }

    /// Creates an empty entry for `device_id` if none exists.
    pub fn ensure(&self, device_id: &str) {
        let id = normalize_device_id(device_id);
        let inserted = {
            let mut devices = self.devices.write();
            if devices.contains_key(&id) {
                false
            } else {
                devices.insert(id.clone(), Arc::new(DeviceState::new()));
                true
            }
        };

        if inserted {
            tracing::debug!(device = %id, "Device added to registry");
            self.event_bus.publish(DeviceEvent::device_added(id));
        }
    }

    /// Overlays a raw cloud device record onto the entry for `device_id`.
    ///
    /// The record's keys are kept as pass-through fields.
    pub fn seed(&self, device_id: &str, record: Map<String, Value>) {
        let incoming = DeviceState::from_record(record);
        self.update_with(device_id, |state| state.overlay(&incoming));
    }

    /// Applies a decoded telemetry change to the entry for `device_id`.
    ///
    /// Returns `true` if the stored state changed.
    pub fn apply(&self, device_id: &str, change: &StateChange) -> bool {
        self.update_with(device_id, |state| state.apply(change))
    }

    /// Returns the current state of a device.
    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceState>> {
        self.devices
            .read()
            .get(&normalize_device_id(device_id))
            .cloned()
    }

    /// Returns every device with its current state.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Arc<DeviceState>> {
        self.devices.read().clone()
    }

    /// Returns the ids of all devices.
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        self.devices.read().keys().cloned().collect()
    }

    /// Returns the number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Returns `true` if the registry holds no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Removes a device. Returns `true` if it existed.
    pub fn remove(&self, device_id: &str) -> bool {
        let id = normalize_device_id(device_id);
        let removed = self.devices.write().remove(&id).is_some();

        if removed {
            tracing::debug!(device = %id, "Device removed from registry");
            self.event_bus.publish(DeviceEvent::device_removed(id));
        }
        removed
    }

    /// Clone-modify-replace under the write lock.
    fn update_with<F>(&self, device_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut DeviceState) -> bool,
    {
        let id = normalize_device_id(device_id);

        let (added, new_state) = {
            let mut devices = self.devices.write();
            let current = devices.get(&id).cloned();
            let added = current.is_none();

            let mut next = current.as_deref().cloned().unwrap_or_default();
            let changed = update(&mut next);

            if !changed && !added {
                return false;
            }

            let next = Arc::new(next);
            devices.insert(id.clone(), Arc::clone(&next));
            (added, changed.then_some(next))
        };

        if added {
            tracing::debug!(device = %id, "Device added to registry");
            self.event_bus.publish(DeviceEvent::device_added(id.clone()));
        }
        if let Some(state) = new_state {
            self.event_bus.publish(DeviceEvent::state_changed(id, state));
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::{OutputReading, SettingsReading};

    fn outputs(ac: bool) -> StateChange {
        StateChange::Outputs(OutputReading {
            soc: "82.3".to_string(),
            total_input: 0,
            total_output: 120,
            usb_output: false,
            dc_output: true,
            ac_output: ac,
            led_output: false,
        })
    }

    fn settings() -> StateChange {
        StateChange::Settings(SettingsReading {
            maximum_charging_current: 5,
            ac_silent_charging: false,
            usb_standby_time: 1,
            ac_standby_time: 2,
            dc_standby_time: 3,
            screen_rest_time: 4,
            stop_charge_after: 5,
            discharge_lower_limit: 6,
            ac_charging_upper_limit: 7,
            whole_machine_unused_time: 8,
        })
    }

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn normalize_strips_separators_only() {
        assert_eq!(normalize_device_id("aa:bb-cc"), "aabbcc");
        assert_eq!(normalize_device_id("AABBCC"), "AABBCC");
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("A").is_none());
    }

    #[test]
    fn lookups_normalize_ids() {
        let registry = DeviceRegistry::new();
        registry.apply("7C:2C:67:AB:5F:0E", &outputs(true));

        assert!(registry.get("7C2C67AB5F0E").is_some());
        assert!(registry.get("7C-2C-67-AB-5F-0E").is_some());
        assert_eq!(registry.device_ids(), vec!["7C2C67AB5F0E".to_string()]);
    }

    #[test]
    fn seed_keeps_record_fields() {
        let registry = DeviceRegistry::new();
        registry.seed(
            "AABB",
            record(json!({ "device_id": "AA:BB", "device_name": "F2400" })),
        );

        let state = registry.get("AABB").unwrap();
        assert_eq!(state.extra()["device_name"], "F2400");
    }

    #[test]
    fn settings_then_outputs_loses_nothing() {
        let registry = DeviceRegistry::new();
        registry.seed("AABB", record(json!({ "device_name": "F2400" })));
        registry.apply("AABB", &outputs(true));
        registry.apply("AABB", &settings());

        let state = registry.get("AABB").unwrap();
        assert_eq!(state.extra()["device_name"], "F2400");
        assert_eq!(state.ac_output(), Some(true));
        assert_eq!(state.dc_output(), Some(true));
        assert_eq!(state.soc(), Some("82.3"));
        assert_eq!(state.whole_machine_unused_time(), Some(8));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let registry = DeviceRegistry::new();
        registry.apply("AABB", &outputs(false));

        let before = registry.get("AABB").unwrap();
        registry.apply("AABB", &outputs(true));

        assert_eq!(before.ac_output(), Some(false));
        assert_eq!(registry.get("AABB").unwrap().ac_output(), Some(true));
    }

    #[test]
    fn unchanged_apply_returns_false() {
        let registry = DeviceRegistry::new();
        assert!(registry.apply("AABB", &outputs(true)));
        assert!(!registry.apply("AABB", &outputs(true)));
    }

    #[tokio::test]
    async fn events_are_published() {
        let registry = DeviceRegistry::new();
        let mut rx = registry.subscribe();

        registry.apply("AA:BB", &outputs(true));
        registry.apply("AABB", &outputs(true));
        registry.remove("AABB");

        let added = rx.recv().await.unwrap();
        assert!(matches!(added, DeviceEvent::DeviceAdded { ref device_id } if device_id == "AABB"));

        let changed = rx.recv().await.unwrap();
        match changed {
            DeviceEvent::StateChanged { new_state, .. } => {
                assert_eq!(new_state.ac_output(), Some(true));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The unchanged second apply publishes nothing
        let removed = rx.recv().await.unwrap();
        assert!(matches!(removed, DeviceEvent::DeviceRemoved { .. }));
    }

    #[test]
    fn ensure_is_idempotent() {
        let registry = DeviceRegistry::new();
        let mut rx = registry.subscribe();

        registry.ensure("AABB");
        registry.ensure("AA:BB");

        assert_eq!(registry.len(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn remove_missing_device() {
        let registry = DeviceRegistry::new();
        assert!(!registry.remove("AABB"));
    }

    #[test]
    fn snapshot_returns_all_devices() {
        let registry = DeviceRegistry::new();
        registry.ensure("A");
        registry.ensure("B");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key("A"));
    }
}
