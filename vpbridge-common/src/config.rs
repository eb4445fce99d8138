use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// MQTT broker connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname or IP address.
    #[serde(default)]
    pub host: String,

    /// Broker TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client identifier (defaults to `vpbridge-<device>` when unset).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Prefix for all command and state topics.
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// Prefix for Home Assistant discovery topics.
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    30
}

fn default_base_topic() -> String {
    "epson".to_string()
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
            base_topic: default_base_topic(),
            discovery_prefix: default_discovery_prefix(),
        }
    }
}

impl MqttConfig {
    /// Apply `MQTT_*` environment overrides.
    ///
    /// `env` is a variable lookup, normally `|k| std::env::var(k).ok()`.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = env("MQTT_HOST") {
            self.host = host;
        }
        if let Some(port) = env("MQTT_PORT") {
            self.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid MQTT_PORT '{}': {}", port, e)))?;
        }
        if let Some(username) = env("MQTT_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = env("MQTT_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(base_topic) = env("MQTT_BASE_TOPIC") {
            self.base_topic = base_topic;
        }
        Ok(())
    }

    /// Validate the broker settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config(
                "MQTT host is required (set mqtt.host or MQTT_HOST)".to_string(),
            ));
        }

        for (name, prefix) in [
            ("base_topic", &self.base_topic),
            ("discovery_prefix", &self.discovery_prefix),
        ] {
            if prefix.is_empty() {
                return Err(Error::Config(format!("mqtt.{} cannot be empty", name)));
            }
            if prefix.contains(['+', '#']) || prefix.ends_with('/') {
                return Err(Error::Config(format!(
                    "mqtt.{} '{}' must not contain wildcards or a trailing '/'",
                    name, prefix
                )));
            }
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(Error::Config(
                "MQTT username and password must be set together".to_string(),
            ));
        }

        if self.keep_alive_secs == 0 {
            return Err(Error::Config("mqtt.keep_alive_secs must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Apply the `LOGGING_LEVEL` environment override.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(level) = env("LOGGING_LEVEL") {
            self.level = level.to_lowercase();
        }
    }
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content).map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_mqtt_config() {
        let json5 = r#"
        {
            mqtt: {
                host: "broker.local",
                port: 8883,
                username: "bridge",
                password: "secret",
            },
            logging: {
                level: "debug",
            },
        }
        "#;

        let config: TestConfig = parse_config(json5).unwrap();

        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
        assert_eq!(config.mqtt.base_topic, "epson");
        assert_eq!(config.logging.level, "debug");
        config.mqtt.validate().unwrap();
    }

    #[test]
    fn test_default_config() {
        let config: TestConfig = parse_config("{}").unwrap();

        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert_eq!(config.mqtt.discovery_prefix, "homeassistant");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_missing_host_is_invalid() {
        let config = MqttConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut mqtt = MqttConfig::default();
        let env = env_from(&[
            ("MQTT_HOST", "10.0.0.2"),
            ("MQTT_PORT", "1884"),
            ("MQTT_USERNAME", "ha"),
            ("MQTT_PASSWORD", "pw"),
            ("MQTT_BASE_TOPIC", "cinema"),
        ]);
        mqtt.apply_env(&env).unwrap();

        assert_eq!(mqtt.host, "10.0.0.2");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(mqtt.username.as_deref(), Some("ha"));
        assert_eq!(mqtt.password.as_deref(), Some("pw"));
        assert_eq!(mqtt.base_topic, "cinema");

        let mut logging = LoggingConfig::default();
        logging.apply_env(env_from(&[("LOGGING_LEVEL", "DEBUG")]));
        assert_eq!(logging.level, "debug");
    }

    #[test]
    fn test_invalid_port_env() {
        let mut mqtt = MqttConfig::default();
        let result = mqtt.apply_env(env_from(&[("MQTT_PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_wildcard_base_topic_rejected() {
        let mqtt = MqttConfig {
            host: "broker".to_string(),
            base_topic: "epson/#".to_string(),
            ..Default::default()
        };
        assert!(mqtt.validate().is_err());
    }

    #[test]
    fn test_partial_credentials_rejected() {
        let mqtt = MqttConfig {
            host: "broker".to_string(),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        assert!(mqtt.validate().is_err());

        let mqtt = MqttConfig {
            host: "broker".to_string(),
            username: Some("ha".to_string()),
            ..Default::default()
        };
        assert!(mqtt.validate().is_err());
    }
}
