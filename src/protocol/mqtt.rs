// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT client plumbing for the power station broker.

use rumqttc::{AsyncClient, MqttOptions, QoS, Transport};
use uuid::Uuid;

use crate::config::TelemetryConfig;
use crate::error::ProtocolError;

use super::{FramePublisher, client_response_filter, request_topic, state_topic};

/// Default port for plain MQTT.
const DEFAULT_TCP_PORT: u16 = 1883;

/// Handle used to publish frames and manage subscriptions.
///
/// Cheap to clone; all clones share the same connection.
#[derive(Debug, Clone)]
pub struct MqttLink {
    client: AsyncClient,
}

impl MqttLink {
    /// Wraps a connected client.
    #[must_use]
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    /// Subscribes to the state and client-response topics of a device.
    ///
    /// # Errors
    ///
    /// Returns error if the client refuses either subscription.
    pub async fn subscribe_device(&self, device_id: &str) -> Result<(), ProtocolError> {
        let state = state_topic(device_id);
        let responses = client_response_filter(device_id);

        self.client
            .subscribe(&state, QoS::AtLeastOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;
        self.client
            .subscribe(&responses, QoS::AtLeastOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;

        tracing::debug!(
            device = %device_id,
            state = %state,
            responses = %responses,
            "Subscribed to device topics"
        );
        Ok(())
    }

    /// Sends a disconnect request to the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.client.disconnect().await.map_err(ProtocolError::Mqtt)
    }
}

// A full request queue means the event loop is not draining (broker down),
// so the publish fails instead of waiting for room.
impl FramePublisher for MqttLink {
    async fn publish_frame(&self, device_id: &str, frame: &[u8]) -> Result<(), ProtocolError> {
        let topic = request_topic(device_id);

        tracing::debug!(topic = %topic, len = frame.len(), "Publishing frame");

        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, frame.to_vec())
            .map_err(ProtocolError::Mqtt)
    }
}

/// Generates a client id from the account user name and 8 random hex digits.
pub(crate) fn generate_client_id(username: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{username}{}", &random[..8])
}

/// Builds connection options for the broker named in `config`.
///
/// The URL scheme selects the transport: `ws://` and `wss://` connect over
/// websocket, anything else over plain TCP.
pub(crate) fn mqtt_options(
    config: &TelemetryConfig,
    client_id: &str,
    username: &str,
    password: &str,
) -> Result<MqttOptions, ProtocolError> {
    let url = config.broker_url();

    let mut options = if let Some(rest) = url.strip_prefix("wss://") {
        let port = parse_ws_port(rest, 443)?;
        let mut options = MqttOptions::new(client_id, url, port);
        options.set_transport(Transport::wss_with_default_config());
        options
    } else if let Some(rest) = url.strip_prefix("ws://") {
        let port = parse_ws_port(rest, 80)?;
        let mut options = MqttOptions::new(client_id, url, port);
        options.set_transport(Transport::Ws);
        options
    } else {
        let (host, port) = parse_mqtt_url(url)?;
        MqttOptions::new(client_id, host, port)
    };

    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);
    options.set_credentials(username, password);

    Ok(options)
}

/// Extracts the port from the authority of a websocket URL without scheme.
fn parse_ws_port(rest: &str, default: u16) -> Result<u16, ProtocolError> {
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(ProtocolError::InvalidAddress(format!(
            "Missing host in broker URL: {rest}"
        )));
    }

    match authority.rsplit_once(':') {
        Some((_, p)) => p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}"))),
        None => Ok(default),
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if url.is_empty() {
        return Err(ProtocolError::InvalidAddress(
            "MQTT broker host is required".to_string(),
        ));
    }

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), DEFAULT_TCP_PORT)
    };

    Ok((host, port))
}
