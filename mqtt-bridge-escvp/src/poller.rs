//! Projector state polling and state publishing.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vpbridge_framework::{Publisher, Result, TopicBuilder};

use crate::commands::CommandTable;
use crate::device::{DeviceClient, PowerState};

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Power state, or `None` when it could not be read.
    pub power: Option<PowerState>,
    /// Number of state messages published.
    pub published: usize,
    /// Number of device reads that failed.
    pub failed_reads: usize,
}

/// Periodically reads projector state and publishes it, retained.
pub struct StatusPoller {
    device: Arc<dyn DeviceClient>,
    table: Arc<CommandTable>,
    publisher: Publisher,
    topics: TopicBuilder,
    interval: Duration,
}

impl StatusPoller {
    /// Create a new poller.
    pub fn new(
        device: Arc<dyn DeviceClient>,
        table: Arc<CommandTable>,
        publisher: Publisher,
        topics: TopicBuilder,
        interval: Duration,
    ) -> Self {
        Self {
            device,
            table,
            publisher,
            topics,
            interval,
        }
    }

    /// Run the polling loop until cancelled.
    ///
    /// Returns an error only when publishing fails, which means the broker
    /// connection is gone.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(
            device = %self.topics.device(),
            interval_secs = self.interval.as_secs(),
            "Starting status poller"
        );

        loop {
            let report = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                report = self.poll_once() => report?,
            };

            debug!(
                power = ?report.power,
                published = report.published,
                failed = report.failed_reads,
                "Poll cycle complete"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!("Status poller stopped");
        Ok(())
    }

    /// Perform a single poll cycle.
    ///
    /// Device read failures are logged and counted; they never abort the cycle.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let mut report = PollReport::default();

        let power = match self.device.get_power().await {
            Ok(power) => power,
            Err(e) => {
                warn!(error = %e, "Failed to read power state");
                report.failed_reads += 1;
                return Ok(report);
            }
        };
        report.power = Some(power.clone());

        match power {
            PowerState::Off => {
                self.publisher
                    .publish_state(&self.topics.power_state_topic(), "OFF")
                    .await?;
                report.published += 1;
            }
            PowerState::On => {
                self.publisher
                    .publish_state(&self.topics.power_state_topic(), "ON")
                    .await?;
                report.published += 1;
                self.poll_values(&mut report).await?;
            }
            PowerState::Unknown(code) => {
                debug!(code = %code, "Projector is in a transitional power state");
            }
        }

        Ok(report)
    }

    async fn poll_values(&self, report: &mut PollReport) -> Result<()> {
        let keys = self
            .table
            .ranged()
            .map(|s| s.key.as_str())
            .chain(self.table.readouts().map(|r| r.key.as_str()));

        for key in keys {
            match self.device.read_config_value(key).await {
                Ok(value) => {
                    self.publisher
                        .publish_state(&self.topics.state_topic(key), value)
                        .await?;
                    report.published += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to read value");
                    report.failed_reads += 1;
                }
            }
        }

        for setting in self.table.enums() {
            let raw = match self.device.get_property(&setting.query).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(key = %setting.key, error = %e, "Failed to read option");
                    report.failed_reads += 1;
                    continue;
                }
            };

            match setting.option_by_raw(raw.trim()) {
                Some(option) => {
                    self.publisher
                        .publish_state(&self.topics.option_state_topic(&setting.key), &option.label)
                        .await?;
                    report.published += 1;
                }
                None => debug!(key = %setting.key, raw = %raw, "No option matches device value"),
            }
        }

        Ok(())
    }
}
