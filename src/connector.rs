// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The collaborator-facing connector.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

use crate::cloud::{AuthPipeline, CloudClient, RequestSigner};
use crate::command::{CommandAck, CommandDispatcher};
use crate::config::ConnectorConfig;
use crate::error::{CommandError, Result};
use crate::event::DeviceEvent;
use crate::protocol::MqttLink;
use crate::registry::DeviceRegistry;
use crate::state::DeviceState;
use crate::telemetry::TelemetryChannel;

/// Name reported by [`Connector::health`].
pub const HEALTH_NAME: &str = "sydpower-mqtt";

/// Liveness report for the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    /// Fixed connector name.
    pub name: &'static str,
    /// `true` while the broker connection is up.
    pub alive: bool,
}

/// Connects a cloud account and exposes its power stations.
///
/// The connector owns the device registry, the command dispatcher and at
/// most one telemetry channel. Reads go through the registry; writes go
/// through [`run_command`](Self::run_command).
///
/// # Examples
///
/// ```no_run
/// use powerstation_bridge::{Connector, ConnectorConfig};
///
/// #[tokio::main]
/// async fn main() -> powerstation_bridge::Result<()> {
///     let connector = Connector::new(ConnectorConfig::new("user@example.com", "secret"))?;
///     connector.connect_with_retry().await?;
///
///     for (id, state) in connector.get_all_devices() {
///         println!("{id}: {:?}% charged", state.soc());
///     }
///
///     connector.run_command("7C2C67AB5F0E", "REGEnableACOutput", None).await?;
///     connector.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Connector {
    config: ConnectorConfig,
    cloud: CloudClient,
    registry: DeviceRegistry,
    dispatcher: CommandDispatcher<MqttLink>,
    channel: Mutex<Option<TelemetryChannel>>,
    broker_up: parking_lot::Mutex<Option<Arc<AtomicBool>>>,
}

impl Connector {
    /// Creates a disconnected connector.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        let cloud = CloudClient::new(config.cloud.clone())?;
        Ok(Self::with_cloud_client(config, cloud))
    }

    /// Creates a disconnected connector that signs cloud requests with
    /// `signer`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_signer(config: ConnectorConfig, signer: Arc<dyn RequestSigner>) -> Result<Self> {
        let cloud = CloudClient::with_signer(config.cloud.clone(), signer)?;
        Ok(Self::with_cloud_client(config, cloud))
    }

    fn with_cloud_client(config: ConnectorConfig, cloud: CloudClient) -> Self {
        Self {
            config,
            cloud,
            registry: DeviceRegistry::new(),
            dispatcher: CommandDispatcher::new(),
            channel: Mutex::new(None),
            broker_up: parking_lot::Mutex::new(None),
        }
    }

    /// Runs the handshake and starts telemetry.
    ///
    /// Calling this again tears down the previous connection first and
    /// runs the whole sequence from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`](crate::Error::Auth) naming the failed handshake
    /// stage, or [`Error::Protocol`](crate::Error::Protocol) if the cloud or
    /// broker cannot be reached.
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.channel.lock().await;
        self.teardown(&mut slot).await;
        let channel = self.establish().await?;
        self.install(&mut slot, channel);
        Ok(())
    }

    /// Like [`connect`](Self::connect), retrying the whole sequence under
    /// the configured connect policy.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn connect_with_retry(&self) -> Result<()> {
        let mut slot = self.channel.lock().await;
        self.teardown(&mut slot).await;
        let channel = self.config.connect_retry.run(|| self.establish()).await?;
        self.install(&mut slot, channel);
        Ok(())
    }

    /// Connects with retry unless a connection already exists.
    ///
    /// # Errors
    ///
    /// Returns the error of the last connect attempt.
    pub async fn ensure_connected(&self) -> Result<()> {
        let mut slot = self.channel.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        let channel = self.config.connect_retry.run(|| self.establish()).await?;
        self.install(&mut slot, channel);
        Ok(())
    }

    async fn establish(&self) -> Result<TelemetryChannel> {
        let handshake = AuthPipeline::new(&self.cloud, &self.config.credentials)
            .run()
            .await?;

        let device_ids = handshake.device_ids();
        for record in handshake.devices {
            self.registry.seed(&record.device_id, record.raw);
        }

        let channel = TelemetryChannel::start(
            &self.config.telemetry,
            &self.config.credentials,
            &handshake.session,
            device_ids,
            self.registry.clone(),
        )
        .await?;

        Ok(channel)
    }

    fn install(&self, slot: &mut Option<TelemetryChannel>, channel: TelemetryChannel) {
        self.dispatcher.attach(channel.link());
        *self.broker_up.lock() = Some(channel.connection_flag());
        tracing::info!(devices = channel.device_ids().len(), "Connector ready");
        *slot = Some(channel);
    }

    async fn teardown(&self, slot: &mut Option<TelemetryChannel>) {
        self.dispatcher.detach();
        *self.broker_up.lock() = None;
        if let Some(channel) = slot.take() {
            channel.shutdown().await;
        }
    }

    /// Returns every known device with its last-known state.
    #[must_use]
    pub fn get_all_devices(&self) -> HashMap<String, Arc<DeviceState>> {
        self.registry.snapshot()
    }

    /// Returns the last-known state of one device.
    ///
    /// The id may contain `:` or `-` separators.
    #[must_use]
    pub fn get_device_by_id(&self, device_id: &str) -> Option<Arc<DeviceState>> {
        self.registry.get(device_id)
    }

    /// Publishes a named command to a device.
    ///
    /// Returns once the frame is queued with the MQTT client; the effect
    /// appears in the registry when the device next reports.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] as a value. The connection is unaffected.
    pub async fn run_command(
        &self,
        device_id: &str,
        command: &str,
        value: Option<&str>,
    ) -> std::result::Result<CommandAck, CommandError> {
        self.dispatcher.run_command(device_id, command, value).await
    }

    /// Subscribes to registry change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.registry.subscribe()
    }

    /// Returns the device registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Returns `true` while a telemetry connection is installed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.dispatcher.is_connected()
    }

    /// Returns the connector's liveness.
    ///
    /// `alive` follows the broker connection itself, so it drops while the
    /// client is reconnecting even though a channel is still installed.
    #[must_use]
    pub fn health(&self) -> Health {
        let broker_up = self
            .broker_up
            .lock()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire));
        Health {
            name: HEALTH_NAME,
            alive: self.is_connected() && broker_up,
        }
    }

    /// Returns the number of running pollers, zero when disconnected.
    pub async fn poller_count(&self) -> usize {
        self.channel
            .lock()
            .await
            .as_ref()
            .map_or(0, TelemetryChannel::poller_count)
    }

    /// Returns `(applied, dropped)` frame counts of the current connection.
    pub async fn frame_counts(&self) -> Option<(u64, u64)> {
        self.channel.lock().await.as_ref().map(|channel| {
            let stats = channel.stats();
            (stats.frames_applied(), stats.frames_dropped())
        })
    }

    /// Stops pollers, closes the MQTT connection and detaches the dispatcher.
    ///
    /// The registry keeps its last-known state.
    pub async fn shutdown(&self) {
        let mut slot = self.channel.lock().await;
        self.teardown(&mut slot).await;
        tracing::info!("Connector shut down");
    }
}
