// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport for power station frames.
//!
//! Topic layout, per device id:
//! - Full-state broadcasts: `<id>/device/response/state`
//! - Client responses: `<id>/device/response/client/<channel>`
//! - Requests and commands: `<id>/client/request/data`
//!
//! Outbound frames go through the [`FramePublisher`] trait so that polling
//! and command dispatch do not depend on a live broker.

mod mqtt;

pub use mqtt::MqttLink;
pub(crate) use mqtt::{generate_client_id, mqtt_options};

use std::future::Future;

use crate::error::ProtocolError;

const CLIENT_RESPONSE_INFIX: &str = "/device/response/client/";

/// Something that can deliver a raw frame to a device's request topic.
///
/// Implementations publish with at-least-once delivery and resolve once the
/// frame has been handed to the client library. They never wait for the
/// device to react.
pub trait FramePublisher: Send + Sync {
    /// Publishes `frame` to `<device_id>/client/request/data`.
    ///
    /// # Errors
    ///
    /// Returns error if the client refuses the publish.
    fn publish_frame(
        &self,
        device_id: &str,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}

/// Topic carrying full-state broadcasts from a device.
#[must_use]
pub fn state_topic(device_id: &str) -> String {
    format!("{device_id}/device/response/state")
}

/// Wildcard filter for all client-response channels of a device.
#[must_use]
pub fn client_response_filter(device_id: &str) -> String {
    format!("{device_id}{CLIENT_RESPONSE_INFIX}+")
}

/// Topic that requests and commands are published to.
#[must_use]
pub fn request_topic(device_id: &str) -> String {
    format!("{device_id}/client/request/data")
}

/// Splits a client-response topic into device id and channel.
///
/// Returns `None` for any other topic shape.
///
/// # Examples
///
/// ```
/// use powerstation_bridge::protocol::parse_client_response_topic;
///
/// assert_eq!(
///     parse_client_response_topic("AABB/device/response/client/04"),
///     Some(("AABB", "04"))
/// );
/// assert_eq!(parse_client_response_topic("AABB/device/response/state"), None);
/// ```
#[must_use]
pub fn parse_client_response_topic(topic: &str) -> Option<(&str, &str)> {
    let (device_id, channel) = topic.split_once(CLIENT_RESPONSE_INFIX)?;
    if device_id.is_empty() || device_id.contains('/') || channel.is_empty() || channel.contains('/')
    {
        return None;
    }
    Some((device_id, channel))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::FramePublisher;
    use crate::error::ProtocolError;

    /// In-memory publisher that records every frame.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingPublisher {
        frames: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        fail: bool,
    }

    impl RecordingPublisher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// A publisher whose every publish fails.
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn published(&self) -> Vec<(String, Vec<u8>)> {
            self.frames.lock().clone()
        }

        pub(crate) fn count_for(&self, device_id: &str) -> usize {
            self.frames
                .lock()
                .iter()
                .filter(|(id, _)| id == device_id)
                .count()
        }
    }

    impl FramePublisher for RecordingPublisher {
        async fn publish_frame(&self, device_id: &str, frame: &[u8]) -> Result<(), ProtocolError> {
            if self.fail {
                return Err(ProtocolError::ConnectionFailed("broker gone".to_string()));
            }
            self.frames
                .lock()
                .push((device_id.to_string(), frame.to_vec()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_for_device() {
        assert_eq!(state_topic("AABB"), "AABB/device/response/state");
        assert_eq!(client_response_filter("AABB"), "AABB/device/response/client/+");
        assert_eq!(request_topic("AABB"), "AABB/client/request/data");
    }

    #[test]
    fn parse_client_response_channels() {
        assert_eq!(
            parse_client_response_topic("AABB/device/response/client/data"),
            Some(("AABB", "data"))
        );
        assert_eq!(parse_client_response_topic("/device/response/client/04"), None);
        assert_eq!(parse_client_response_topic("AABB/device/response/client/"), None);
        assert_eq!(
            parse_client_response_topic("AABB/device/response/client/04/x"),
            None
        );
        assert_eq!(parse_client_response_topic("AABB/client/request/data"), None);
    }
}
