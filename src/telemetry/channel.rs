// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The persistent MQTT telemetry connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::cloud::AuthSession;
use crate::config::{Credentials, TelemetryConfig};
use crate::error::ProtocolError;
use crate::protocol::{MqttLink, generate_client_id, mqtt_options};
use crate::registry::DeviceRegistry;

use super::decoder::decode_frame;
use super::poller::PollerSet;

/// Capacity of the client's outbound request queue.
const REQUEST_QUEUE_CAPACITY: usize = 32;

/// Pause between event loop polls after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Time allowed for the disconnect request to reach the broker on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Counters for inbound telemetry frames.
#[derive(Debug, Default)]
pub struct TelemetryStats {
    applied: AtomicU64,
    dropped: AtomicU64,
}

impl TelemetryStats {
    /// Frames decoded and merged into the registry.
    #[must_use]
    pub fn frames_applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Frames ignored because their topic or length was not recognized.
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct ChannelInner {
    link: MqttLink,
    device_ids: Vec<String>,
    registry: DeviceRegistry,
    poll_interval: Duration,
    pollers: PollerSet,
    pollers_started: AtomicBool,
    stats: TelemetryStats,
    connected: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl ChannelInner {
    /// Subscribes every device and starts the pollers on first connect.
    async fn on_connected(&self) {
        for device_id in &self.device_ids {
            if let Err(e) = self.link.subscribe_device(device_id).await {
                tracing::error!(device = %device_id, error = %e, "Subscription failed");
            }
        }

        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if !self.pollers_started.swap(true, Ordering::AcqRel) {
            self.pollers.start(
                &self.link,
                &self.device_ids,
                self.poll_interval,
                &self.connected,
            );
        }
    }

    /// Decodes one inbound message and merges it into the registry.
    fn handle_message(&self, topic: &str, payload: &[u8]) {
        match decode_frame(topic, payload) {
            Ok(frame) => {
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                let changed = self.registry.apply(&frame.device_id, &frame.change);
                tracing::debug!(
                    device = %frame.device_id,
                    kind = frame.change.kind(),
                    changed,
                    "Telemetry frame applied"
                );
            }
            Err(rejection) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(topic = %topic, reason = %rejection, "Telemetry frame dropped");
            }
        }
    }
}

/// Owns the single MQTT connection shared by all devices of an account.
///
/// On every connect acknowledgement the channel (re)subscribes each device
/// to its state and client-response topics. Polling starts after the first
/// acknowledgement and runs until [`shutdown`](Self::shutdown) or drop.
///
/// Connection errors after the first acknowledgement are logged and the
/// underlying client reconnects on its own; the session tokens are reused.
pub struct TelemetryChannel {
    inner: Arc<ChannelInner>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryChannel {
    /// Connects to the broker and waits for its acknowledgement.
    ///
    /// The MQTT user name is the session's MQTT token and the password is
    /// the account password.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] for a malformed broker URL
    /// and [`ProtocolError::ConnectionFailed`] if the broker does not
    /// acknowledge the connection within the configured timeout.
    pub async fn start(
        config: &TelemetryConfig,
        credentials: &Credentials,
        session: &AuthSession,
        device_ids: Vec<String>,
        registry: DeviceRegistry,
    ) -> Result<Self, ProtocolError> {
        let client_id = generate_client_id(credentials.username());
        let options = mqtt_options(
            config,
            &client_id,
            session.mqtt_token(),
            credentials.password(),
        )?;
        let (client, event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);

        let inner = Arc::new(ChannelInner {
            link: MqttLink::new(client),
            device_ids,
            registry,
            poll_interval: config.poll_interval(),
            pollers: PollerSet::new(),
            pollers_started: AtomicBool::new(false),
            stats: TelemetryStats::default(),
            connected: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        });

        let (connack_tx, connack_rx) = oneshot::channel();
        let event_task = tokio::spawn(handle_events(event_loop, Arc::clone(&inner), connack_tx));

        let timeout = config.connection_timeout();
        let outcome = match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(message))) => Err(ProtocolError::ConnectionFailed(message)),
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )),
            Err(_) => Err(ProtocolError::ConnectionFailed(format!(
                "MQTT connection timeout after {}ms",
                timeout.as_millis()
            ))),
        };

        if let Err(e) = outcome {
            event_task.abort();
            tracing::error!(broker = %config.broker_url(), error = %e, "MQTT connection failed");
            return Err(e);
        }

        tracing::info!(
            broker = %config.broker_url(),
            client_id = %client_id,
            devices = inner.device_ids.len(),
            "MQTT connected"
        );

        Ok(Self {
            inner,
            event_task: Mutex::new(Some(event_task)),
        })
    }

    /// Returns a handle for publishing on this connection.
    #[must_use]
    pub fn link(&self) -> MqttLink {
        self.inner.link.clone()
    }

    /// Returns `true` while the broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns a shared flag that tracks the broker connection.
    ///
    /// The flag outlives the channel and reads `false` once it is shut down.
    #[must_use]
    pub fn connection_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner.connected)
    }

    /// Returns the inbound frame counters.
    #[must_use]
    pub fn stats(&self) -> &TelemetryStats {
        &self.inner.stats
    }

    /// Returns the number of running pollers.
    #[must_use]
    pub fn poller_count(&self) -> usize {
        self.inner.pollers.len()
    }

    /// Returns the device ids served by this channel.
    #[must_use]
    pub fn device_ids(&self) -> &[String] {
        &self.inner.device_ids
    }

    /// Stops all pollers and closes the connection.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.pollers.stop_all();

        if let Err(e) = self.inner.link.disconnect().await {
            tracing::warn!(error = %e, "MQTT disconnect request failed");
        }

        let task = self.event_task.lock().take();
        if let Some(task) = task {
            let abort = task.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                abort.abort();
            }
        }

        self.inner.connected.store(false, Ordering::Release);
        tracing::info!("Telemetry channel shut down");
    }
}

impl Drop for TelemetryChannel {
    fn drop(&mut self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.connected.store(false, Ordering::Release);
        self.inner.pollers.stop_all();
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for TelemetryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryChannel")
            .field("devices", &self.inner.device_ids)
            .field("connected", &self.is_connected())
            .field("pollers", &self.poller_count())
            .finish_non_exhaustive()
    }
}

/// Drives the MQTT event loop until disconnect.
async fn handle_events(
    mut event_loop: EventLoop,
    inner: Arc<ChannelInner>,
    connack_tx: oneshot::Sender<Result<(), String>>,
) {
    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker acknowledged connection");
                inner.connected.store(true, Ordering::Release);

                // Subscribing from this task could deadlock on a full request queue
                let on_connect = Arc::clone(&inner);
                tokio::spawn(async move { on_connect.on_connected().await });

                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                inner.handle_message(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::info!("MQTT disconnected");
                inner.connected.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                inner.connected.store(false, Ordering::Release);

                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Err(e.to_string()));
                    break;
                }
                if inner.closed.load(Ordering::Acquire) {
                    break;
                }

                tracing::error!(error = %e, "MQTT event loop error, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
