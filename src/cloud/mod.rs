// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client for the vendor's serverless cloud endpoint.
//!
//! Every call is a signed `POST` to a single endpoint. A [`Route`] selects
//! the server-side method and the shape of its parameters.
//!
//! - [`CloudClient`]: signs and sends routed requests, retrying transport failures
//! - [`AuthPipeline`]: the four-stage handshake built on top of it
//! - [`RequestSigner`]: pluggable signature strategy

mod auth;
mod fingerprint;
mod signer;

pub use auth::{AuthPipeline, AuthSession, AuthStage, DeviceRecord, Handshake};
pub use fingerprint::{ClientInfo, USER_AGENT};
pub use signer::{CloudRequest, HmacMd5Signer, RequestSigner};

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{Value, json};

use crate::config::CloudConfig;
use crate::error::{Error, ParseError, ProtocolError};

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-serverless-sign";

const ANONYMOUS_AUTHORIZE_METHOD: &str = "serverless.auth.user.anonymousAuthorize";
const INVOKE_METHOD: &str = "serverless.function.runtime.invoke";

/// Logical selector for the server-side method behind the endpoint.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Anonymous client authorization.
    AnonymousAuthorize,
    /// Account login with user name and password.
    LoginByCredentials {
        /// Account user name.
        username: &'a str,
        /// Account password.
        password: &'a str,
    },
    /// Exchange of the access token for an MQTT broker token.
    MqttToken {
        /// Access token from login.
        access_token: &'a str,
    },
    /// Listing of the devices bound to the account.
    DeviceList {
        /// Access token from login.
        access_token: &'a str,
    },
}

impl Route<'_> {
    /// Returns a short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnonymousAuthorize => "api-auth",
            Self::LoginByCredentials { .. } => "api-login",
            Self::MqttToken { .. } => "api-mqtt",
            Self::DeviceList { .. } => "api-devs",
        }
    }

    /// Returns the server-side method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::AnonymousAuthorize => ANONYMOUS_AUTHORIZE_METHOD,
            _ => INVOKE_METHOD,
        }
    }

    /// Returns the router URL invoked by this route, if any.
    #[must_use]
    pub fn function_url(&self) -> Option<&'static str> {
        match self {
            Self::AnonymousAuthorize => None,
            Self::LoginByCredentials { .. } => Some("user/pub/login"),
            Self::MqttToken { .. } => Some("common/emqx.getAccessToken"),
            Self::DeviceList { .. } => Some("client/device/kh/getList"),
        }
    }

    /// Encodes the route's parameters as the JSON string sent in `params`.
    ///
    /// # Errors
    ///
    /// Returns error if the parameters cannot be serialized.
    pub fn params(&self, client_info: &ClientInfo) -> Result<String, serde_json::Error> {
        let Some(url) = self.function_url() else {
            return Ok("{}".to_string());
        };

        let client_info = serde_json::to_value(client_info)?;
        let mut args = match self {
            Self::LoginByCredentials { username, password } => json!({
                "$url": url,
                "data": { "locale": "en", "username": username, "password": password },
                "clientInfo": client_info,
            }),
            Self::DeviceList { .. } => json!({
                "$url": url,
                "data": { "locale": "en", "pageIndex": 1, "pageSize": 100 },
                "clientInfo": client_info,
            }),
            _ => json!({
                "$url": url,
                "data": { "locale": "en" },
                "clientInfo": client_info,
            }),
        };

        if let (Self::MqttToken { access_token } | Self::DeviceList { access_token }, Some(map)) =
            (self, args.as_object_mut())
        {
            map.insert("uniIdToken".to_string(), Value::from(*access_token));
        }

        serde_json::to_string(&json!({
            "functionTarget": "router",
            "functionArgs": args,
        }))
    }
}

impl fmt::Debug for Route<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signed HTTP client for the cloud endpoint.
///
/// Owns the emulated client fingerprint, so the device id sent to the cloud
/// stays constant for the lifetime of the client.
#[derive(Clone)]
pub struct CloudClient {
    http: Client,
    config: CloudConfig,
    signer: Arc<dyn RequestSigner>,
    client_info: ClientInfo,
}

impl CloudClient {
    /// Creates a client using the default HMAC-MD5 signer.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: CloudConfig) -> Result<Self, ProtocolError> {
        let signer = Arc::new(HmacMd5Signer::new(config.client_secret()));
        Self::with_signer(config, signer)
    }

    /// Creates a client with a custom request signer.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_signer(
        config: CloudConfig,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self, ProtocolError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self {
            http,
            config,
            signer,
            client_info: ClientInfo::generate(),
        })
    }

    /// Returns the client fingerprint.
    #[must_use]
    pub fn client_info(&self) -> &ClientInfo {
        &self.client_info
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Builds the request body for a route.
    ///
    /// # Errors
    ///
    /// Returns error if the route parameters cannot be serialized.
    pub fn build_request(
        &self,
        route: &Route<'_>,
        authorize_token: Option<&str>,
    ) -> Result<CloudRequest, serde_json::Error> {
        Ok(CloudRequest {
            method: route.method().to_string(),
            params: route.params(&self.client_info)?,
            space_id: self.config.space_id().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            token: authorize_token.map(str::to_string),
        })
    }

    /// Sends a routed request and returns the decoded JSON response.
    ///
    /// Transport failures and non-success HTTP statuses are retried under
    /// the configured [`RetryPolicy`](crate::RetryPolicy). The same signed
    /// body is resent on every attempt. A body that is not JSON is not
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] with the last transport error once
    /// retries are exhausted, or [`Error::Parse`] if the request cannot be
    /// encoded or the response is not JSON.
    pub async fn call(
        &self,
        route: &Route<'_>,
        authorize_token: Option<&str>,
    ) -> Result<Value, Error> {
        let request = self
            .build_request(route, authorize_token)
            .map_err(ParseError::Json)?;
        let signature = self.signer.sign(&request);

        tracing::debug!(route = route.name(), "Sending cloud request");

        let body = self
            .config
            .retry()
            .run(|| self.send(&request, &signature))
            .await?;

        let value = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(route = route.name(), error = %e, "Cloud response is not JSON");
            ParseError::Json(e)
        })?;
        Ok(value)
    }

    async fn send(&self, request: &CloudRequest, signature: &str) -> Result<Vec<u8>, ProtocolError> {
        let response = self
            .http
            .post(self.config.endpoint())
            .header(SIGNATURE_HEADER, signature)
            .json(request)
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        if !response.status().is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.bytes().await.map_err(ProtocolError::Http)?;

        tracing::debug!(method = %request.method, len = body.len(), "Received cloud response");

        Ok(body.to_vec())
    }
}

impl fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClient")
            .field("endpoint", &self.config.endpoint())
            .field("device_id", &self.client_info.device_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_value(route: Route<'_>) -> Value {
        let info = ClientInfo::with_device_id("DEV");
        serde_json::from_str(&route.params(&info).unwrap()).unwrap()
    }

    #[test]
    fn anonymous_authorize_has_empty_params() {
        let info = ClientInfo::with_device_id("DEV");
        let route = Route::AnonymousAuthorize;

        assert_eq!(route.method(), "serverless.auth.user.anonymousAuthorize");
        assert_eq!(route.params(&info).unwrap(), "{}");
    }

    #[test]
    fn login_params_carry_credentials() {
        let params = params_value(Route::LoginByCredentials {
            username: "user@example.com",
            password: "pw",
        });

        assert_eq!(params["functionTarget"], "router");
        assert_eq!(params["functionArgs"]["$url"], "user/pub/login");
        assert_eq!(params["functionArgs"]["data"]["username"], "user@example.com");
        assert_eq!(params["functionArgs"]["data"]["password"], "pw");
        assert_eq!(params["functionArgs"]["clientInfo"]["deviceId"], "DEV");
        assert!(params["functionArgs"].get("uniIdToken").is_none());
    }

    #[test]
    fn token_routes_carry_uni_id_token() {
        let mqtt = params_value(Route::MqttToken { access_token: "acc" });
        assert_eq!(mqtt["functionArgs"]["$url"], "common/emqx.getAccessToken");
        assert_eq!(mqtt["functionArgs"]["uniIdToken"], "acc");

        let devices = params_value(Route::DeviceList { access_token: "acc" });
        assert_eq!(devices["functionArgs"]["$url"], "client/device/kh/getList");
        assert_eq!(devices["functionArgs"]["data"]["pageSize"], 100);
        assert_eq!(devices["functionArgs"]["uniIdToken"], "acc");
    }

    #[test]
    fn build_request_sets_token_and_space() {
        let client = CloudClient::new(CloudConfig::default().with_space_id("space")).unwrap();
        let request = client
            .build_request(&Route::MqttToken { access_token: "acc" }, Some("auth"))
            .unwrap();

        assert_eq!(request.method, INVOKE_METHOD);
        assert_eq!(request.space_id, "space");
        assert_eq!(request.token.as_deref(), Some("auth"));
        assert!(request.timestamp > 0);
    }

    #[test]
    fn route_debug_does_not_leak_password() {
        let route = Route::LoginByCredentials {
            username: "u",
            password: "hunter2",
        };
        assert_eq!(format!("{route:?}"), "api-login");
    }
}
