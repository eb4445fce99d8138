//! Live broker connection with filtered message routing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vpbridge_common::{MqttConfig, mqtt_options, topic_matches};

use crate::error::{BridgeError, Result};
use crate::transport::{InboundMessage, Transport};

/// Capacity of the rumqttc request channel.
const REQUEST_CAPACITY: usize = 64;

/// How long a clean shutdown waits for the DISCONNECT to be flushed.
const FAREWELL_TIMEOUT: Duration = Duration::from_secs(1);

/// One established broker connection, as seen by a bridge session.
///
/// Filters must be installed with [`filtered_messages`](Self::filtered_messages)
/// before the matching subscribe request is sent, otherwise retained messages
/// delivered right after the SUBACK can be missed.
#[async_trait]
pub trait BrokerLink: Send + Sized + 'static {
    /// Handle for publishing and subscribing.
    fn transport(&self) -> Arc<dyn Transport>;

    /// Route every incoming message matching `filter` into the returned channel.
    fn filtered_messages(&mut self, filter: &str) -> mpsc::UnboundedReceiver<InboundMessage>;

    /// Drive the connection until it fails or `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation and an error on any connection failure.
    async fn drive(self, cancel: CancellationToken) -> Result<()>;
}

/// Retained message sent as the MQTT last will and on clean shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Farewell {
    pub topic: String,
    pub payload: Vec<u8>,
}

struct Route {
    filter: String,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

/// MQTT connection backed by rumqttc.
pub struct MqttConnection {
    client: AsyncClient,
    eventloop: EventLoop,
    routes: Vec<Route>,
    farewell: Option<Farewell>,
}

impl MqttConnection {
    /// Connect to the broker and wait for its CONNACK.
    ///
    /// Any failure before the CONNACK (unreachable host, refused credentials,
    /// timeout) is reported as [`BridgeError::Connection`].
    pub async fn open(
        config: &MqttConfig,
        default_client_id: &str,
        farewell: Option<Farewell>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let will = farewell
            .as_ref()
            .map(|f| LastWill::new(f.topic.clone(), f.payload.clone(), QoS::AtLeastOnce, true));
        let options = mqtt_options(config, default_client_id, will)?;
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        loop {
            let event = tokio::time::timeout(connect_timeout, eventloop.poll())
                .await
                .map_err(|_| {
                    BridgeError::connection(format!(
                        "timed out after {:?} waiting for CONNACK from {}:{}",
                        connect_timeout, config.host, config.port
                    ))
                })??;

            match event {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(BridgeError::connection(format!(
                            "broker refused connection: {:?}",
                            ack.code
                        )));
                    }
                    break;
                }
                other => tracing::trace!(event = ?other, "Event before CONNACK"),
            }
        }

        tracing::info!(host = %config.host, port = config.port, "Connected to MQTT broker");

        Ok(Self {
            client,
            eventloop,
            routes: Vec::new(),
            farewell,
        })
    }

    fn route(&mut self, topic: &str, payload: &[u8]) {
        let mut delivered = false;

        self.routes.retain(|route| {
            if !topic_matches(&route.filter, topic) {
                return true;
            }
            delivered = true;
            // A closed receiver means its consumer is gone; drop the route.
            route
                .tx
                .send(InboundMessage::new(topic, payload.to_vec()))
                .is_ok()
        });

        if !delivered {
            tracing::debug!(topic = %topic, "Dropping message without a matching filter");
        }
    }

    async fn say_farewell(&mut self) {
        if let Some(farewell) = &self.farewell {
            if let Err(e) = self.client.try_publish(
                farewell.topic.clone(),
                QoS::AtLeastOnce,
                true,
                farewell.payload.clone(),
            ) {
                tracing::debug!(error = %e, "Could not queue farewell message");
            }
        }

        if self.client.try_disconnect().is_err() {
            return;
        }

        let eventloop = &mut self.eventloop;
        let flush = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };

        if tokio::time::timeout(FAREWELL_TIMEOUT, flush).await.is_err() {
            tracing::debug!("Timed out flushing MQTT disconnect");
        }
    }
}

#[async_trait]
impl BrokerLink for MqttConnection {
    fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.client.clone())
    }

    fn filtered_messages(&mut self, filter: &str) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.push(Route {
            filter: filter.to_string(),
            tx,
        });
        rx
    }

    async fn drive(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.say_farewell().await;
                    tracing::debug!("MQTT connection closed");
                    return Ok(());
                }
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.route(&publish.topic, &publish.payload);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return Err(BridgeError::connection("broker closed the connection"));
                }
                Ok(event) => tracing::trace!(event = ?event, "MQTT event"),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
