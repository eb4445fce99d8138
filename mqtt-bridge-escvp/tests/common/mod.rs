//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mqtt_bridge_escvp::device::{DeviceClient, DeviceError, PowerState};
use vpbridge_common::topic_matches;
use vpbridge_framework::{BridgeError, BrokerLink, InboundMessage, Result, Transport};

/// A call made on [`MockDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetPower,
    ReadConfigValue(String),
    GetProperty(String),
    SendCommand(String),
    SendConfigValue(String, String),
}

/// Scriptable projector.
#[derive(Default)]
pub struct MockDevice {
    /// `None` makes `get_power` fail.
    pub power: Mutex<Option<PowerState>>,
    /// Values returned by `read_config_value`; missing keys fail.
    pub values: Mutex<HashMap<String, i64>>,
    /// Raw values returned by `get_property`, by query command; missing queries fail.
    pub properties: Mutex<HashMap<String, String>>,
    /// Commands and keys that fail when sent.
    pub failing: Mutex<HashSet<String>>,
    /// Commands that panic when sent.
    pub panicking: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
}

impl MockDevice {
    pub fn powered(power: PowerState) -> Self {
        let device = Self::default();
        *device.power.lock().unwrap() = Some(power);
        device
    }

    pub fn with_value(self, key: &str, value: i64) -> Self {
        self.values.lock().unwrap().insert(key.to_string(), value);
        self
    }

    pub fn with_property(self, query: &str, raw: &str) -> Self {
        self.properties
            .lock()
            .unwrap()
            .insert(query.to_string(), raw.to_string());
        self
    }

    pub fn failing_on(self, name: &str) -> Self {
        self.failing.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn panicking_on(self, command: &str) -> Self {
        self.panicking.lock().unwrap().insert(command.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change device state.
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SendCommand(_) | Call::SendConfigValue(..)))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, name: &str) -> std::result::Result<(), DeviceError> {
        if self.failing.lock().unwrap().contains(name) {
            Err(DeviceError::Rejected {
                command: name.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceClient for MockDevice {
    async fn get_power(&self) -> std::result::Result<PowerState, DeviceError> {
        self.record(Call::GetPower);
        self.power
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DeviceError::Timeout(std::time::Duration::from_secs(5)))
    }

    async fn read_config_value(&self, key: &str) -> std::result::Result<i64, DeviceError> {
        self.record(Call::ReadConfigValue(key.to_string()));
        self.check(key)?;
        self.values
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .ok_or_else(|| DeviceError::UnsupportedKey(key.to_string()))
    }

    async fn get_property(&self, command: &str) -> std::result::Result<String, DeviceError> {
        self.record(Call::GetProperty(command.to_string()));
        self.check(command)?;
        self.properties
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .ok_or_else(|| DeviceError::Rejected {
                command: command.to_string(),
            })
    }

    async fn send_command(&self, command: &str) -> std::result::Result<(), DeviceError> {
        self.record(Call::SendCommand(command.to_string()));
        if self.panicking.lock().unwrap().contains(command) {
            panic!("device driver crashed on {command}");
        }
        self.check(command)
    }

    async fn send_config_value(&self, key: &str, value: &str) -> std::result::Result<(), DeviceError> {
        self.record(Call::SendConfigValue(key.to_string(), value.to_string()));
        self.check(key)?;
        if let Ok(parsed) = value.parse() {
            self.values.lock().unwrap().insert(key.to_string(), parsed);
        }
        Ok(())
    }
}

/// A message published through [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Transport that records everything and can be made to fail.
#[derive(Default)]
pub struct RecordingTransport {
    published: Mutex<Vec<Published>>,
    /// Ordered log of `route:`, `publish:` and `subscribe:` events.
    log: Mutex<Vec<String>>,
    pub fail_publish: AtomicBool,
}

impl RecordingTransport {
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload)
            .collect()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }

    fn note(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BridgeError::Publish {
                topic: topic.to_string(),
                message: "connection lost".to_string(),
            });
        }
        self.note(format!("publish:{}", topic));
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<()> {
        self.note(format!("subscribe:{}", filter));
        Ok(())
    }
}

enum LinkEvent {
    Message(InboundMessage),
    Fail(String),
}

/// Test-side handle for injecting traffic into a [`FakeLink`].
#[derive(Clone)]
pub struct LinkHandle {
    events: mpsc::UnboundedSender<LinkEvent>,
    stopped: Arc<AtomicBool>,
}

impl LinkHandle {
    /// Deliver a message as if the broker had sent it.
    pub fn send(&self, topic: &str, payload: &str) {
        let _ = self
            .events
            .send(LinkEvent::Message(InboundMessage::new(topic, payload)));
    }

    /// Make the connection fail.
    pub fn fail(&self, reason: &str) {
        let _ = self.events.send(LinkEvent::Fail(reason.to_string()));
    }

    /// Whether the driver exited through cancellation.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// In-memory broker link.
pub struct FakeLink {
    transport: Arc<RecordingTransport>,
    routes: Vec<(String, mpsc::UnboundedSender<InboundMessage>)>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    stopped: Arc<AtomicBool>,
}

impl FakeLink {
    pub fn new(transport: Arc<RecordingTransport>) -> (Self, LinkHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let link = Self {
            transport,
            routes: Vec::new(),
            events: rx,
            stopped: stopped.clone(),
        };
        (link, LinkHandle { events: tx, stopped })
    }
}

#[async_trait]
impl BrokerLink for FakeLink {
    fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    fn filtered_messages(&mut self, filter: &str) -> mpsc::UnboundedReceiver<InboundMessage> {
        self.transport.note(format!("route:{}", filter));
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.push((filter.to_string(), tx));
        rx
    }

    async fn drive(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.events.recv() => event,
            };

            match event {
                Some(LinkEvent::Message(message)) => {
                    for (filter, tx) in &self.routes {
                        if topic_matches(filter, &message.topic) {
                            let _ = tx.send(message.clone());
                        }
                    }
                }
                Some(LinkEvent::Fail(reason)) => return Err(BridgeError::connection(reason)),
                None => {
                    cancel.cancelled().await;
                    break;
                }
            }
        }

        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}
