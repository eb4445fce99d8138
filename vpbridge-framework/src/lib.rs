//! vpbridge Bridge Framework
//!
//! Common abstractions for building bridges between an MQTT broker and a
//! request/response device.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading, environment overrides and validation
//! - [`BridgeRunner`] for supervising the broker connection (reconnect loop, shutdown)
//! - [`MqttConnection`] and the [`BrokerLink`] trait for filtered message routing
//! - [`Publisher`] for retained state publishing over any [`Transport`]
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use vpbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, shutdown_signal};
//!
//! let args = BridgeArgs::parse_with_default("mybridge.json5");
//! let config = MyBridgeConfig::load(args.config.as_deref())?;
//!
//! let shutdown = CancellationToken::new();
//! let runner = BridgeRunner::new("mybridge", Duration::from_secs(3));
//! runner.run(&mut MySessionFactory::new(config), shutdown).await;
//! ```

mod args;
mod config;
mod connection;
mod error;
mod publisher;
mod runner;
mod status;
mod transport;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, EnvLookup};
pub use connection::{BrokerLink, Farewell, MqttConnection};
pub use error::{BridgeError, Result};
pub use publisher::Publisher;
pub use runner::{BridgeRunner, ConnectionState, SessionFactory, shutdown_signal};
pub use status::BridgeStatus;
pub use transport::{InboundMessage, Transport};

// Re-export commonly used types from vpbridge-common
pub use vpbridge_common::{LogFormat, LoggingConfig, MqttConfig, TopicBuilder, init_tracing};
