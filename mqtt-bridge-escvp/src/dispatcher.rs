//! Inbound command handling.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vpbridge_framework::{BridgeError, InboundMessage, Result, TopicBuilder};

use crate::commands::{CommandDefinition, CommandTable, POWER_OFF, POWER_ON, Resolved};
use crate::device::DeviceClient;

/// What happened to one inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A device call was made and succeeded.
    Sent,
    /// The key is not in the table.
    Unknown,
    /// The key names a read-only value.
    ReadOnly,
    /// The payload matches none of the setting's option labels.
    UnmatchedOption,
    /// The device call failed.
    Failed,
}

/// Translates command messages into device calls.
pub struct CommandDispatcher {
    device: Arc<dyn DeviceClient>,
    table: Arc<CommandTable>,
    topics: TopicBuilder,
}

impl CommandDispatcher {
    /// Create a new dispatcher.
    pub fn new(device: Arc<dyn DeviceClient>, table: Arc<CommandTable>, topics: TopicBuilder) -> Self {
        Self {
            device,
            table,
            topics,
        }
    }

    /// Consume messages until cancelled.
    ///
    /// Per-message failures are logged and the loop moves on. A closed
    /// message stream means the broker connection is gone and is an error.
    pub async fn run(
        self,
        mut messages: mpsc::UnboundedReceiver<InboundMessage>,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!(filter = %self.topics.command_filter(), "Starting command dispatcher");

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = messages.recv() => message,
            };

            let Some(message) = message else {
                return Err(BridgeError::connection("command stream closed"));
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.dispatch(&message) => {
                    debug!(topic = %message.topic, outcome = ?outcome, "Command handled");
                }
            }
        }

        debug!("Command dispatcher stopped");
        Ok(())
    }

    /// Handle one command message.
    pub async fn dispatch(&self, message: &InboundMessage) -> DispatchOutcome {
        let Some(key) = self.topics.parse_command_topic(&message.topic) else {
            error!(topic = %message.topic, "Unknown command");
            return DispatchOutcome::Unknown;
        };
        let value = message.payload_str();

        info!(command = %key, value = %value, "Executing command");

        let result = match self.table.resolve(key) {
            Resolved::Definition(CommandDefinition::Ranged(setting)) => {
                self.device.send_config_value(&setting.key, &value).await
            }
            Resolved::Definition(CommandDefinition::Trigger(trigger)) => {
                self.device.send_command(&trigger.command).await
            }
            Resolved::Definition(CommandDefinition::Enum(setting)) => {
                match setting.option_by_label(&value) {
                    Some(option) => self.device.send_command(&option.command).await,
                    None => {
                        warn!(command = %key, value = %value, "No option matches value");
                        return DispatchOutcome::UnmatchedOption;
                    }
                }
            }
            Resolved::Definition(CommandDefinition::Readout(_)) => {
                error!(command = %key, "Command is read-only");
                return DispatchOutcome::ReadOnly;
            }
            Resolved::Power => {
                let command = if value == "OFF" { POWER_OFF } else { POWER_ON };
                self.device.send_command(command).await
            }
            Resolved::Unknown => {
                error!(command = %key, "Unknown command");
                return DispatchOutcome::Unknown;
            }
        };

        match result {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => {
                warn!(command = %key, error = %e, "Command failed");
                DispatchOutcome::Failed
            }
        }
    }
}
