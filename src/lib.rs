// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Powerstation Bridge - connects Sydpower/BrightEMS battery power stations.
//!
//! This library logs into the vendor cloud, keeps a live MQTT telemetry
//! connection to every power station of the account and writes device
//! registers with Modbus frames over the same connection.
//!
//! # Supported Features
//!
//! - **Cloud handshake**: anonymous authorization, login, MQTT token, device list
//! - **Telemetry**: periodic polling, binary frame decoding, merged device state
//! - **Commands**: output switches, LED modes and settings registers
//! - **Events**: registry change notifications via broadcast channels
//!
//! # Quick Start
//!
//! ```no_run
//! use powerstation_bridge::{Connector, ConnectorConfig};
//!
//! #[tokio::main]
//! async fn main() -> powerstation_bridge::Result<()> {
//!     let connector = Connector::new(ConnectorConfig::new("user@example.com", "secret"))?;
//!     connector.connect_with_retry().await?;
//!
//!     let mut events = connector.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {event:?}");
//!         }
//!     });
//!
//!     connector
//!         .run_command("7C2C67AB5F0E", "REGStopChargeAfter", Some("90"))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Output Switches
//!
//! ```no_run
//! use std::sync::Arc;
//! use powerstation_bridge::{Connector, ConnectorConfig, Output, PowerStation};
//!
//! #[tokio::main]
//! async fn main() -> powerstation_bridge::Result<()> {
//!     let connector = Arc::new(Connector::new(ConnectorConfig::new("user@example.com", "secret"))?);
//!     let station = PowerStation::new(connector, "7C:2C:67:AB:5F:0E");
//!
//!     // Connects on first use
//!     station.set_output(Output::Ac, true).await?;
//!
//!     for output in Output::ALL {
//!         println!("{output}: {}", station.output_enabled(output).await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cloud;
pub mod command;
mod config;
mod connector;
pub mod error;
pub mod event;
mod output;
pub mod protocol;
pub mod registry;
mod retry;
pub mod state;
pub mod telemetry;

pub use cloud::{AuthSession, CloudClient, RequestSigner};
pub use command::{CommandAck, Register};
pub use config::{CloudConfig, ConnectorConfig, Credentials, TelemetryConfig};
pub use connector::{Connector, HEALTH_NAME, Health};
pub use error::{AuthError, CommandError, Error, ParseError, ProtocolError, Result, ValueError};
pub use event::{DeviceEvent, EventBus};
pub use output::{Output, PowerStation};
pub use registry::DeviceRegistry;
pub use retry::RetryPolicy;
pub use state::{DeviceState, StateChange};
