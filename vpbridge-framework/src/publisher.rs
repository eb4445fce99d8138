//! State publisher for the broker.

use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use crate::error::Result;
use crate::transport::Transport;

/// Publisher for sending device state to the broker.
///
/// Wraps a shared [`Transport`]. State and JSON payloads are always
/// published retained so late subscribers immediately see current values.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Publish a retained text value.
    pub async fn publish_state(&self, topic: &str, value: impl Display) -> Result<()> {
        let payload = value.to_string();
        tracing::debug!(topic = %topic, payload = %payload, "Publishing state");
        self.transport
            .publish(topic, payload.into_bytes(), true)
            .await
    }

    /// Publish a retained JSON value.
    pub async fn publish_json<T: serde::Serialize>(&self, topic: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        tracing::debug!(topic = %topic, bytes = payload.len(), "Publishing JSON");
        self.transport.publish(topic, payload, true).await
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}
