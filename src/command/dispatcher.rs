// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fire-and-forget command dispatch.

use parking_lot::RwLock;

use crate::error::CommandError;
use crate::protocol::FramePublisher;
use crate::registry::normalize_device_id;

use super::Register;

/// Acknowledgement that a command frame was handed to the MQTT client.
///
/// This does not mean the device applied it; the effect shows up in the
/// registry once a later telemetry frame reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAck {
    /// Normalized id of the target device.
    pub device_id: String,
    /// The command name.
    pub command: String,
    /// The exact frame that was published.
    pub frame: Vec<u8>,
}

/// Encodes named commands and publishes them on a device's request topic.
///
/// The dispatcher starts detached. It only publishes while a publisher is
/// attached, which the connector does once the MQTT connection is up.
pub struct CommandDispatcher<P> {
    publisher: RwLock<Option<P>>,
}

impl<P> CommandDispatcher<P>
where
    P: FramePublisher + Clone,
{
    /// Creates a detached dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            publisher: RwLock::new(None),
        }
    }

    /// Attaches the publisher used for subsequent commands.
    pub fn attach(&self, publisher: P) {
        *self.publisher.write() = Some(publisher);
    }

    /// Detaches the publisher, returning it if one was attached.
    pub fn detach(&self) -> Option<P> {
        self.publisher.write().take()
    }

    /// Returns `true` if a publisher is attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.publisher.read().is_some()
    }

    /// Encodes and publishes a command.
    ///
    /// Checks run in order: the command must exist, a publisher must be
    /// attached, the value must encode. No frame is published unless all
    /// three pass.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] as a value; nothing is torn down on failure.
    pub async fn run_command(
        &self,
        device_id: &str,
        command: &str,
        value: Option<&str>,
    ) -> Result<CommandAck, CommandError> {
        let Some(register) = Register::lookup(command) else {
            tracing::warn!(command = %command, "Unknown command");
            return Err(CommandError::NotFound(command.to_string()));
        };

        let publisher = self.publisher.read().clone();
        let Some(publisher) = publisher else {
            tracing::warn!(command = %command, "MQTT not connected, cannot send commands");
            return Err(CommandError::NotConnected);
        };

        let frame = register
            .encode(value)
            .map_err(|source| CommandError::InvalidValue {
                command: command.to_string(),
                source,
            })?;

        let device_id = normalize_device_id(device_id);

        publisher
            .publish_frame(&device_id, &frame)
            .await
            .map_err(|e| {
                tracing::warn!(device = %device_id, command = %command, error = %e, "Command publish failed");
                CommandError::Publish(e.to_string())
            })?;

        tracing::debug!(device = %device_id, command = %command, "Command sent");

        Ok(CommandAck {
            device_id,
            command: command.to_string(),
            frame,
        })
    }
}

impl<P> Default for CommandDispatcher<P>
where
    P: FramePublisher + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for CommandDispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("connected", &self.publisher.read().is_some())
            .finish()
    }
}
