//! Bridge status reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::Publisher;

/// Bridge status information, published retained on `<base>/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name (e.g., "escvp").
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("online", "offline").
    pub status: String,
    /// Name of the bridged device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// When the status was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Additional metadata (protocol-specific).
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl BridgeStatus {
    fn new(bridge: impl Into<String>, version: impl Into<String>, status: &str) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: status.to_string(),
            device: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a status with "online" state, stamped with the current time.
    pub fn online(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, "online").stamped()
    }

    /// Create a status with "offline" state and no timestamp.
    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, "offline")
    }

    /// Set the timestamp to the current time.
    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }

    /// Set the bridged device name.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Add a metadata entry to the status.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Serialize to the JSON payload published on the status topic.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Publish this status, retained, on `topic`.
    pub async fn publish(&self, publisher: &Publisher, topic: &str) -> Result<()> {
        publisher.publish_json(topic, self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_online() {
        let status = BridgeStatus::online("escvp", "0.2.0").with_device("cinema");
        assert_eq!(status.bridge, "escvp");
        assert_eq!(status.status, "online");
        assert_eq!(status.device.as_deref(), Some("cinema"));
        assert!(status.timestamp.is_some());
    }

    #[test]
    fn test_status_with_metadata() {
        let status = BridgeStatus::online("escvp", "0.2.0")
            .with_metadata("projector", serde_json::json!("192.168.1.20:3629"))
            .with_metadata("poll_interval", serde_json::json!(10));

        let value: serde_json::Value =
            serde_json::from_slice(&status.to_payload().unwrap()).unwrap();
        assert_eq!(value["projector"], "192.168.1.20:3629");
        assert_eq!(value["poll_interval"], 10);
    }

    #[test]
    fn test_offline_payload() {
        let payload = BridgeStatus::offline("escvp", "0.2.0")
            .with_device("cinema")
            .to_payload()
            .unwrap();

        let json = String::from_utf8(payload).unwrap();
        assert!(json.contains("\"status\":\"offline\""));
        assert!(json.contains("\"device\":\"cinema\""));
        assert!(!json.contains("timestamp"));
    }
}
