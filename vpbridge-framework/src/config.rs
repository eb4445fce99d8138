//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use vpbridge_common::{LoggingConfig, MqttConfig};

/// Environment variable lookup, normally backed by [`std::env::var`].
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// loading from an optional JSON5 file, environment overrides, and
/// validation.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use vpbridge_framework::{BridgeConfig, MqttConfig, LoggingConfig};
///
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyBridgeConfig {
///     #[serde(default)]
///     pub mqtt: MqttConfig,
///     #[serde(default)]
///     pub logging: LoggingConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned + Default {
    /// Get the MQTT configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Apply environment overrides on top of the loaded file.
    fn apply_env(&mut self, _env: EnvLookup<'_>) -> Result<()> {
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading. The default checks the MQTT section.
    fn validate(&self) -> Result<()> {
        self.mqtt()
            .validate()
            .map_err(|e| BridgeError::validation(e.to_string()))
    }

    /// Load configuration from an optional file and the given environment.
    ///
    /// Without a file the configuration starts from defaults. Calls
    /// [`validate`](Self::validate) after the overrides are applied.
    fn load_with_env(path: Option<&Path>, env: EnvLookup<'_>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(BridgeError::ConfigNotFound {
                        path: path.display().to_string(),
                    });
                }
                vpbridge_common::load_config(path)?
            }
            None => Self::default(),
        };

        config.apply_env(env)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from an optional file and the process environment.
    fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, &|key: &str| std::env::var(key).ok())
    }
}
