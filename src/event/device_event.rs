// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use std::sync::Arc;

use crate::state::DeviceState;

/// Events emitted by the device registry.
///
/// State snapshots are shared: a [`StateChanged`](Self::StateChanged) event
/// carries the same `Arc` that the registry stores, so receivers see exactly
/// the record that readers of the registry see.
///
/// # Examples
///
/// ```
/// use powerstation_bridge::event::DeviceEvent;
///
/// let added = DeviceEvent::device_added("7C2C67AB5F0E");
/// assert_eq!(added.device_id(), "7C2C67AB5F0E");
/// assert!(added.is_lifecycle());
/// ```
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A device entry was created.
    DeviceAdded {
        /// Normalized device id.
        device_id: String,
    },

    /// A device entry was removed.
    DeviceRemoved {
        /// Normalized device id.
        device_id: String,
    },

    /// A device's state changed.
    StateChanged {
        /// Normalized device id.
        device_id: String,
        /// The complete new state of the device.
        new_state: Arc<DeviceState>,
    },
}

impl DeviceEvent {
    /// Returns the device id associated with this event.
    #[must_use]
    pub fn device_id(&self) -> &str {
        match self {
            Self::DeviceAdded { device_id }
            | Self::DeviceRemoved { device_id }
            | Self::StateChanged { device_id, .. } => device_id,
        }
    }

    /// Returns `true` if this is a device lifecycle event (added/removed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceAdded { .. } | Self::DeviceRemoved { .. })
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Creates a device added event.
    #[must_use]
    pub fn device_added(device_id: impl Into<String>) -> Self {
        Self::DeviceAdded {
            device_id: device_id.into(),
        }
    }

    /// Creates a device removed event.
    #[must_use]
    pub fn device_removed(device_id: impl Into<String>) -> Self {
        Self::DeviceRemoved {
            device_id: device_id.into(),
        }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(device_id: impl Into<String>, new_state: Arc<DeviceState>) -> Self {
        Self::StateChanged {
            device_id: device_id.into(),
            new_state,
        }
    }
}
