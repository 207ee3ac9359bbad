// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the power station connector.
//!
//! Handshake failures ([`AuthError`]) and transport failures
//! ([`ProtocolError`]) are raised to the caller, which is expected to retry
//! the whole connect sequence. Command failures ([`CommandError`]) are
//! returned as values from
//! [`Connector::run_command`](crate::Connector::run_command) and never
//! tear anything down.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A cloud handshake stage failed.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A cloud request or response could not be encoded or decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A device command could not be dispatched.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Device was not found in the registry.
    #[error("device not found: {0}")]
    DeviceNotFound(String),
}

/// Failures of the four-stage cloud handshake.
///
/// Each variant names the stage that failed and carries the upstream
/// message when the cloud supplied one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Anonymous authorization returned no token.
    #[error("AUTH failed: {0}")]
    AuthFailed(String),

    /// Credential login was rejected.
    #[error("LOGIN failed: {0}")]
    LoginFailed(String),

    /// The MQTT token exchange failed.
    #[error("MQTT auth failed: {0}")]
    MqttAuthFailed(String),

    /// The device list could not be fetched.
    #[error("DEVICE fetch failed: {0}")]
    DeviceFetchFailed(String),

    /// The account has no usable devices.
    #[error("no valid devices found")]
    NoDevicesFound,
}

/// Errors related to protocol communication (HTTP/MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT client request failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the remote end failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors related to parsing cloud responses.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced when encoding a parameterized register value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The command requires a value but none was given.
    #[error("a value is required")]
    Missing,

    /// The value is not a valid register value.
    #[error("invalid register value: {0}")]
    Invalid(String),
}

/// Command dispatch failures, returned as values rather than raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No register with this name exists.
    #[error("command not found: {0}")]
    NotFound(String),

    /// There is no active MQTT connection to publish on.
    #[error("MQTT not connected, cannot send commands")]
    NotConnected,

    /// The value given to a parameterized command was rejected.
    #[error("invalid value for {command}: {source}")]
    InvalidValue {
        /// The command name.
        command: String,
        /// Why the value was rejected.
        source: ValueError,
    },

    /// The MQTT client refused the publish.
    #[error("publish failed: {0}")]
    Publish(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_display_names_stage() {
        let err = AuthError::LoginFailed("wrong password".to_string());
        assert_eq!(err.to_string(), "LOGIN failed: wrong password");
    }

    #[test]
    fn error_from_auth_error() {
        let err: Error = AuthError::NoDevicesFound.into();
        assert!(matches!(err, Error::Auth(AuthError::NoDevicesFound)));
    }

    #[test]
    fn error_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = ParseError::Json(json_err).into();
        assert!(matches!(err, Error::Parse(ParseError::Json(_))));
        assert!(err.to_string().starts_with("parse error: JSON parse error"));
    }

    #[test]
    fn command_error_display() {
        let err = CommandError::NotFound("REGFoo".to_string());
        assert_eq!(err.to_string(), "command not found: REGFoo");
    }

    #[test]
    fn invalid_value_display() {
        let err = CommandError::InvalidValue {
            command: "REGStopChargeAfter".to_string(),
            source: ValueError::Invalid("abc".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for REGStopChargeAfter: invalid register value: abc"
        );
    }
}
