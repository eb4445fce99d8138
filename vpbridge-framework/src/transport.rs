//! Broker transport abstraction.

use std::borrow::Cow;

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};

use crate::error::{BridgeError, Result};

/// A message delivered by the broker on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Full topic the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Create a new inbound message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Outbound half of a broker connection.
///
/// Implemented for [`rumqttc::AsyncClient`]; tests substitute in-memory
/// recorders.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()>;

    /// Subscribe to a topic filter.
    async fn subscribe(&self, filter: &str) -> Result<()>;
}

#[async_trait]
impl Transport for AsyncClient {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        AsyncClient::publish(self, topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn subscribe(&self, filter: &str) -> Result<()> {
        AsyncClient::subscribe(self, filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| BridgeError::Subscribe {
                filter: filter.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_str() {
        let msg = InboundMessage::new("epson/command/BRIGHT", "42");
        assert_eq!(msg.payload_str(), "42");

        let msg = InboundMessage::new("epson/command/BRIGHT", vec![0x34, 0xff, 0x32]);
        assert_eq!(msg.payload_str(), "4\u{fffd}2");
    }
}
