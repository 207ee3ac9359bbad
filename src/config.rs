// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connector configuration types.

use std::fmt;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Account credentials for the vendor cloud.
///
/// The password is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the account user name (e-mail).
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the cloud REST endpoint.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use powerstation_bridge::{CloudConfig, RetryPolicy};
///
/// let config = CloudConfig::default()
///     .with_endpoint("http://127.0.0.1:8080/client")
///     .with_timeout(Duration::from_secs(5))
///     .with_retry(RetryPolicy::none());
/// assert_eq!(config.endpoint(), "http://127.0.0.1:8080/client");
/// ```
#[derive(Debug, Clone)]
pub struct CloudConfig {
    endpoint: String,
    space_id: String,
    client_secret: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CloudConfig {
    /// Default cloud endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.next.bspapp.com/client";
    /// Default serverless workspace identifier.
    pub const DEFAULT_SPACE_ID: &'static str = "mp-6c382a98-49b8-40ba-b761-645d83e8ee74";
    /// Default shared signing secret.
    pub const DEFAULT_CLIENT_SECRET: &'static str = "5rCEdl/nx7IgViBe4QYRiQ==";
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Sets the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the workspace identifier sent as `spaceId`.
    #[must_use]
    pub fn with_space_id(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = space_id.into();
        self
    }

    /// Sets the shared secret used by the default request signer.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = secret.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy applied to every HTTP call.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the workspace identifier.
    #[must_use]
    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    /// Returns the shared signing secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the per-call retry policy.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            space_id: Self::DEFAULT_SPACE_ID.to_string(),
            client_secret: Self::DEFAULT_CLIENT_SECRET.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Configuration for the MQTT telemetry connection.
///
/// The broker URL scheme selects the transport: `ws://` and `wss://` use
/// MQTT over websocket, `mqtt://`, `tcp://` or no scheme use plain TCP.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    broker_url: String,
    poll_interval: Duration,
    keep_alive: Duration,
    connection_timeout: Duration,
}

impl TelemetryConfig {
    /// Default broker URL.
    pub const DEFAULT_BROKER_URL: &'static str = "ws://mqtt.sydpower.com:8083/mqtt";
    /// Default interval between "request settings" polls.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
    /// Default time to wait for the broker's connect acknowledgement.
    pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(4);

    /// Sets the broker URL.
    #[must_use]
    pub fn with_broker_url(mut self, url: impl Into<String>) -> Self {
        self.broker_url = url.into();
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Returns the broker URL.
    #[must_use]
    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            broker_url: Self::DEFAULT_BROKER_URL.to_string(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            connection_timeout: Self::DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

/// Complete configuration for a [`Connector`](crate::Connector).
///
/// # Examples
///
/// ```
/// use powerstation_bridge::{ConnectorConfig, RetryPolicy, TelemetryConfig};
///
/// let config = ConnectorConfig::new("user@example.com", "secret")
///     .with_telemetry(TelemetryConfig::default().with_broker_url("mqtt://127.0.0.1:1883"))
///     .with_connect_retry(RetryPolicy::none());
///
/// assert_eq!(config.credentials.username(), "user@example.com");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Cloud account credentials.
    pub credentials: Credentials,
    /// Cloud endpoint settings.
    pub cloud: CloudConfig,
    /// MQTT telemetry settings.
    pub telemetry: TelemetryConfig,
    /// Retry policy for the whole connect sequence.
    pub connect_retry: RetryPolicy,
}

impl ConnectorConfig {
    /// Creates a configuration with default endpoints for the given account.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(username, password),
            cloud: CloudConfig::default(),
            telemetry: TelemetryConfig::default(),
            connect_retry: RetryPolicy::default(),
        }
    }

    /// Replaces the cloud settings.
    #[must_use]
    pub fn with_cloud(mut self, cloud: CloudConfig) -> Self {
        self.cloud = cloud;
        self
    }

    /// Replaces the telemetry settings.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Sets the retry policy for the whole connect sequence.
    #[must_use]
    pub fn with_connect_retry(mut self, retry: RetryPolicy) -> Self {
        self.connect_retry = retry;
        self
    }
}
