// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Four-stage cloud handshake.

use std::fmt;

use serde_json::{Map, Value};

use crate::config::Credentials;
use crate::error::{AuthError, Error};
use crate::registry::normalize_device_id;

use super::{CloudClient, Route};

/// A stage of the cloud handshake, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    /// Anonymous client authorization.
    Authorize,
    /// Credential login.
    Login,
    /// MQTT broker token exchange.
    MqttToken,
    /// Device list fetch.
    DeviceList,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authorize => "authorize",
            Self::Login => "login",
            Self::MqttToken => "mqtt-token",
            Self::DeviceList => "device-list",
        };
        f.write_str(name)
    }
}

/// Tokens obtained by a successful handshake.
///
/// A session is only valid for the lifetime of the connector that obtained
/// it; there is no refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    authorize_token: String,
    access_token: String,
    mqtt_token: String,
}

impl AuthSession {
    /// Creates a session from its three tokens.
    #[must_use]
    pub fn new(
        authorize_token: impl Into<String>,
        access_token: impl Into<String>,
        mqtt_token: impl Into<String>,
    ) -> Self {
        Self {
            authorize_token: authorize_token.into(),
            access_token: access_token.into(),
            mqtt_token: mqtt_token.into(),
        }
    }

    /// Returns the anonymous authorization token.
    #[must_use]
    pub fn authorize_token(&self) -> &str {
        &self.authorize_token
    }

    /// Returns the account access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the MQTT broker token.
    #[must_use]
    pub fn mqtt_token(&self) -> &str {
        &self.mqtt_token
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthSession { .. }")
    }
}

/// A device returned by the device-list stage.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Normalized device id (MAC without separators).
    pub device_id: String,
    /// The raw record as returned by the cloud.
    pub raw: Map<String, Value>,
}

/// Result of a successful handshake.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Tokens for the session.
    pub session: AuthSession,
    /// Devices bound to the account, never empty.
    pub devices: Vec<DeviceRecord>,
}

impl Handshake {
    /// Returns the normalized ids of all devices.
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.device_id.clone()).collect()
    }
}

/// Runs the handshake stages in order, aborting on the first failure.
///
/// Each stage issues one signed call through [`CloudClient::call`], which
/// handles transport retries. The pipeline itself never retries a stage.
#[derive(Debug)]
pub struct AuthPipeline<'a> {
    cloud: &'a CloudClient,
    credentials: &'a Credentials,
}

impl<'a> AuthPipeline<'a> {
    /// Creates a pipeline for the given account.
    #[must_use]
    pub fn new(cloud: &'a CloudClient, credentials: &'a Credentials) -> Self {
        Self { cloud, credentials }
    }

    /// Runs all four stages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] labelled with the failing stage, or
    /// [`Error::Protocol`] if a call could not be completed.
    pub async fn run(&self) -> Result<Handshake, Error> {
        let authorize_token = self.authorize().await?;
        tracing::info!(stage = %AuthStage::Authorize, "Handshake stage succeeded");

        let access_token = self.login(&authorize_token).await?;
        tracing::info!(stage = %AuthStage::Login, "Handshake stage succeeded");

        let mqtt_token = self.mqtt_token(&authorize_token, &access_token).await?;
        tracing::info!(stage = %AuthStage::MqttToken, "Handshake stage succeeded");

        let devices = self.device_list(&authorize_token, &access_token).await?;
        tracing::info!(
            stage = %AuthStage::DeviceList,
            count = devices.len(),
            "Handshake stage succeeded"
        );

        Ok(Handshake {
            session: AuthSession::new(authorize_token, access_token, mqtt_token),
            devices,
        })
    }

    async fn authorize(&self) -> Result<String, Error> {
        let response = self.cloud.call(&Route::AnonymousAuthorize, None).await?;
        log_failure(AuthStage::Authorize, parse_authorize(&response))
    }

    async fn login(&self, authorize_token: &str) -> Result<String, Error> {
        let route = Route::LoginByCredentials {
            username: self.credentials.username(),
            password: self.credentials.password(),
        };
        let response = self.cloud.call(&route, Some(authorize_token)).await?;
        log_failure(AuthStage::Login, parse_login(&response))
    }

    async fn mqtt_token(&self, authorize_token: &str, access_token: &str) -> Result<String, Error> {
        let route = Route::MqttToken { access_token };
        let response = self.cloud.call(&route, Some(authorize_token)).await?;
        log_failure(AuthStage::MqttToken, parse_mqtt_token(&response))
    }

    async fn device_list(
        &self,
        authorize_token: &str,
        access_token: &str,
    ) -> Result<Vec<DeviceRecord>, Error> {
        let route = Route::DeviceList { access_token };
        let response = self.cloud.call(&route, Some(authorize_token)).await?;
        log_failure(AuthStage::DeviceList, parse_device_list(&response))
    }
}

fn log_failure<T>(stage: AuthStage, result: Result<T, AuthError>) -> Result<T, Error> {
    result.map_err(|e| {
        tracing::error!(stage = %stage, error = %e, "Handshake stage failed");
        Error::Auth(e)
    })
}

/// Extracts a readable message from an upstream error value.
fn upstream_message(error: Option<&Value>) -> String {
    match error {
        None | Some(Value::Null) => "No response".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| other.to_string(), str::to_string),
    }
}

fn has_error(response: &Value) -> bool {
    response.get("error").is_some_and(|e| !e.is_null())
}

fn non_empty_str<'v>(response: &'v Value, pointer: &str) -> Option<&'v str> {
    response
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub(crate) fn parse_authorize(response: &Value) -> Result<String, AuthError> {
    non_empty_str(response, "/data/accessToken")
        .map(str::to_string)
        .ok_or_else(|| AuthError::AuthFailed(upstream_message(response.get("error"))))
}

pub(crate) fn parse_login(response: &Value) -> Result<String, AuthError> {
    non_empty_str(response, "/data/token")
        .map(str::to_string)
        .ok_or_else(|| {
            let message = non_empty_str(response, "/data/errMsg")
                .or_else(|| non_empty_str(response, "/data/msg"))
                .map_or_else(|| upstream_message(response.get("error")), str::to_string);
            AuthError::LoginFailed(message)
        })
}

pub(crate) fn parse_mqtt_token(response: &Value) -> Result<String, AuthError> {
    if has_error(response) {
        return Err(AuthError::MqttAuthFailed(upstream_message(
            response.get("error"),
        )));
    }
    non_empty_str(response, "/data/access_token")
        .map(str::to_string)
        .ok_or_else(|| AuthError::MqttAuthFailed("No access_token from MQTT API".to_string()))
}

pub(crate) fn parse_device_list(response: &Value) -> Result<Vec<DeviceRecord>, AuthError> {
    if has_error(response) {
        return Err(AuthError::DeviceFetchFailed(upstream_message(
            response.get("error"),
        )));
    }
    let rows = response
        .pointer("/data/rows")
        .and_then(Value::as_array)
        .ok_or_else(|| AuthError::DeviceFetchFailed("No device list returned".to_string()))?;

    let devices: Vec<DeviceRecord> = rows
        .iter()
        .filter_map(|row| {
            let raw = row.as_object()?;
            let id = raw.get("device_id")?.as_str().filter(|s| !s.is_empty())?;
            Some(DeviceRecord {
                device_id: normalize_device_id(id),
                raw: raw.clone(),
            })
        })
        .collect();

    if devices.is_empty() {
        return Err(AuthError::NoDevicesFound);
    }
    Ok(devices)
}
