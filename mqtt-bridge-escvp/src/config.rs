//! Configuration for the ESC/VP.net bridge.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vpbridge_framework::{BridgeConfig, BridgeError, EnvLookup, LoggingConfig, MqttConfig, Result};

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscVpBridgeConfig {
    /// MQTT broker settings
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Projector settings
    #[serde(default)]
    pub projector: ProjectorConfig,

    /// Delay before reconnecting after a broker failure, in seconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_reconnect_interval() -> u64 {
    3
}

impl Default for EscVpBridgeConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            projector: ProjectorConfig::default(),
            reconnect_interval_secs: default_reconnect_interval(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration for the bridged projector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Projector hostname or IP address
    #[serde(default)]
    pub host: String,

    /// ESC/VP.net TCP port (default: 3629)
    #[serde(default = "default_projector_port")]
    pub port: u16,

    /// Device name used in state and discovery topics (default: host)
    #[serde(default)]
    pub name: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for `PWR ON`/`PWR OFF`, which the projector acknowledges
    /// only after warm-up or cool-down, in milliseconds
    #[serde(default = "default_power_timeout_ms")]
    pub power_timeout_ms: u64,

    /// Poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_projector_port() -> u16 {
    crate::escvp::DEFAULT_PORT
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_power_timeout_ms() -> u64 {
    40_000
}

fn default_poll_interval() -> u64 {
    10
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_projector_port(),
            name: None,
            timeout_ms: default_timeout_ms(),
            power_timeout_ms: default_power_timeout_ms(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl ProjectorConfig {
    /// Device name, falling back to the host.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.host)
    }

    /// `host:port` address of the projector.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Timeout for power on/off requests.
    pub fn power_timeout(&self) -> Duration {
        Duration::from_millis(self.power_timeout_ms)
    }

    /// Interval between poll cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    fn apply_env(&mut self, env: EnvLookup<'_>) -> Result<()> {
        if let Some(host) = env("EPSON_IP") {
            self.host = host;
        }
        if let Some(port) = env("EPSON_PORT") {
            self.port = port
                .parse()
                .map_err(|e| BridgeError::config(format!("Invalid EPSON_PORT '{}': {}", port, e)))?;
        }
        if let Some(name) = env("EPSON_NAME") {
            self.name = Some(name);
        }
        Ok(())
    }
}

impl EscVpBridgeConfig {
    /// Delay between connection attempts.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

impl BridgeConfig for EscVpBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn apply_env(&mut self, env: EnvLookup<'_>) -> Result<()> {
        self.mqtt.apply_env(env)?;
        self.projector.apply_env(env)?;
        self.logging.apply_env(env);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.mqtt
            .validate()
            .map_err(|e| BridgeError::validation(e.to_string()))?;

        if self.projector.host.trim().is_empty() {
            return Err(BridgeError::validation(
                "Projector host is required (set projector.host or EPSON_IP)",
            ));
        }

        let name = self.projector.name();
        if name.is_empty() || name.contains(['/', '+', '#']) {
            return Err(BridgeError::validation(format!(
                "Projector name '{}' cannot be empty or contain '/', '+' or '#'",
                name
            )));
        }

        if self.projector.poll_interval_secs == 0 {
            return Err(BridgeError::validation(
                "projector.poll_interval_secs must be > 0",
            ));
        }

        if self.projector.timeout_ms == 0 {
            return Err(BridgeError::validation("projector.timeout_ms must be > 0"));
        }

        if self.projector.power_timeout_ms == 0 {
            return Err(BridgeError::validation(
                "projector.power_timeout_ms must be > 0",
            ));
        }

        if self.reconnect_interval_secs == 0 {
            return Err(BridgeError::validation(
                "reconnect_interval_secs must be > 0",
            ));
        }

        Ok(())
    }
}
