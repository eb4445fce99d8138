//! Bridge session: one dispatcher and one poller on one broker connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vpbridge_framework::{
    BridgeError, BridgeStatus, BrokerLink, Farewell, MqttConnection, Publisher, Result,
    SessionFactory, TopicBuilder,
};

use crate::commands::CommandTable;
use crate::config::EscVpBridgeConfig;
use crate::device::DeviceClient;
use crate::discovery;
use crate::dispatcher::CommandDispatcher;
use crate::poller::StatusPoller;

/// Bridge name used in status messages.
pub const BRIDGE_NAME: &str = "escvp";

/// How long to wait for the broker's CONNACK.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a session needs besides the broker connection.
///
/// Shared across sessions; only the connection is replaced on reconnect.
pub struct BridgeSession {
    device: Arc<dyn DeviceClient>,
    table: Arc<CommandTable>,
    topics: TopicBuilder,
    poll_interval: Duration,
    status: BridgeStatus,
}

impl BridgeSession {
    /// Create a new session template.
    pub fn new(
        device: Arc<dyn DeviceClient>,
        table: Arc<CommandTable>,
        topics: TopicBuilder,
        poll_interval: Duration,
    ) -> Self {
        let status = BridgeStatus::online(BRIDGE_NAME, env!("CARGO_PKG_VERSION"))
            .with_device(topics.device());
        Self {
            device,
            table,
            topics,
            poll_interval,
            status,
        }
    }

    /// Attach extra metadata to the online status message.
    pub fn with_status_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.status = self.status.with_metadata(key, value);
        self
    }

    /// Message left behind when the bridge goes away.
    pub fn farewell(&self) -> Result<Farewell> {
        let offline = BridgeStatus::offline(BRIDGE_NAME, env!("CARGO_PKG_VERSION"))
            .with_device(self.topics.device());
        Ok(Farewell {
            topic: self.topics.status_topic(),
            payload: offline.to_payload()?,
        })
    }

    /// Run one session on an established link.
    ///
    /// Ends when any task ends. The remaining tasks are then cancelled and
    /// awaited before the first error is returned.
    pub async fn run<L: BrokerLink>(&self, mut link: L, cancel: CancellationToken) -> Result<()> {
        let filter = self.topics.command_filter();
        let messages = link.filtered_messages(&filter);
        let transport = link.transport();
        let publisher = Publisher::new(transport.clone());

        let token = cancel.child_token();
        let mut tasks = JoinSet::new();
        tasks.spawn(link.drive(token.clone()));

        let setup = async {
            self.announce(&publisher).await?;

            let dispatcher = CommandDispatcher::new(
                self.device.clone(),
                self.table.clone(),
                self.topics.clone(),
            );
            tasks.spawn(dispatcher.run(messages, token.clone()));

            transport.subscribe(&filter).await?;
            debug!(filter = %filter, "Subscribed to commands");

            let poller = StatusPoller::new(
                self.device.clone(),
                self.table.clone(),
                publisher.clone(),
                self.topics.clone(),
                self.poll_interval,
            );
            tasks.spawn(poller.run(token.clone()));
            Ok::<_, BridgeError>(())
        };

        let mut outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Ok(()),
            result = setup => result,
        };

        if outcome.is_ok() {
            info!(device = %self.topics.device(), "Bridge session running");
            if let Some(first) = tasks.join_next().await {
                outcome = flatten(first);
            }
        }

        token.cancel();
        while let Some(rest) = tasks.join_next().await {
            if let Err(e) = flatten(rest) {
                if outcome.is_ok() {
                    outcome = Err(e);
                } else {
                    debug!(error = %e, "Additional task error during shutdown");
                }
            }
        }

        outcome
    }

    async fn announce(&self, publisher: &Publisher) -> Result<()> {
        self.status
            .clone()
            .stamped()
            .publish(publisher, &self.topics.status_topic())
            .await?;

        let announcements = discovery::announcements(&self.table, &self.topics);
        let count = announcements.len();
        for announcement in announcements {
            publisher
                .publish_json(&announcement.topic, &announcement.payload)
                .await?;
        }

        debug!(entities = count, "Published discovery configuration");
        Ok(())
    }
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| BridgeError::session(format!("task ended abnormally: {}", e)))?
}

/// Connects to the configured broker and runs a [`BridgeSession`] on each connection.
pub struct EscVpSessionFactory {
    config: EscVpBridgeConfig,
    session: BridgeSession,
    farewell: Farewell,
}

impl EscVpSessionFactory {
    /// Create a factory from the configuration, the command table and a shared device client.
    pub fn new(
        config: EscVpBridgeConfig,
        table: Arc<CommandTable>,
        device: Arc<dyn DeviceClient>,
    ) -> Result<Self> {
        let topics = TopicBuilder::new(&config.mqtt.base_topic, config.projector.name())
            .with_discovery_prefix(&config.mqtt.discovery_prefix);

        let session = BridgeSession::new(
            device,
            table,
            topics,
            config.projector.poll_interval(),
        )
        .with_status_metadata("projector", serde_json::json!(config.projector.address()));

        let farewell = session.farewell()?;

        Ok(Self {
            config,
            session,
            farewell,
        })
    }

    fn client_id(&self) -> String {
        format!("vpbridge-{}", self.config.projector.name())
    }
}

#[async_trait]
impl SessionFactory for EscVpSessionFactory {
    type Connection = MqttConnection;

    async fn connect(&mut self) -> Result<MqttConnection> {
        MqttConnection::open(
            &self.config.mqtt,
            &self.client_id(),
            Some(self.farewell.clone()),
            CONNECT_TIMEOUT,
        )
        .await
    }

    async fn run_session(
        &mut self,
        connection: MqttConnection,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.session.run(connection, cancel).await
    }
}
