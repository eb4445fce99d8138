//! Device client abstraction used by the poller and the dispatcher.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a device call.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Device rejected command '{command}'")]
    Rejected { command: String },
    #[error("Malformed response to '{command}': {response:?}")]
    Protocol { command: String, response: String },
    #[error("Key '{0}' cannot be read or written as a value")]
    UnsupportedKey(String),
    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Reported power state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    /// Warming up, cooling down, abnormal standby or an unrecognized code.
    Unknown(String),
}

impl PowerState {
    /// Map a `PWR?` status code.
    ///
    /// # Example
    /// ```
    /// use mqtt_bridge_escvp::device::PowerState;
    ///
    /// assert_eq!(PowerState::from_code("01"), PowerState::On);
    /// assert_eq!(PowerState::from_code("04"), PowerState::Off);
    /// assert_eq!(PowerState::from_code("02"), PowerState::Unknown("02".to_string()));
    /// ```
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "01" => PowerState::On,
            "00" | "04" => PowerState::Off,
            other => PowerState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "ON"),
            PowerState::Off => write!(f, "OFF"),
            PowerState::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// Operations the bridge needs from a projector.
///
/// Implementations must be safe to call from the poller and the
/// dispatcher concurrently.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Read the power state.
    async fn get_power(&self) -> Result<PowerState, DeviceError>;

    /// Read a ranged setting or readout, in human units.
    async fn read_config_value(&self, key: &str) -> Result<i64, DeviceError>;

    /// Send a query command and return the raw value.
    async fn get_property(&self, command: &str) -> Result<String, DeviceError>;

    /// Send a protocol command without reading a value.
    async fn send_command(&self, command: &str) -> Result<(), DeviceError>;

    /// Write a ranged setting from its human-unit text value.
    async fn send_config_value(&self, key: &str, value: &str) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_codes() {
        assert_eq!(PowerState::from_code("00"), PowerState::Off);
        assert_eq!(PowerState::from_code("01\r"), PowerState::On);
        assert_eq!(PowerState::from_code("03"), PowerState::Unknown("03".to_string()));
        assert_eq!(PowerState::from_code("05"), PowerState::Unknown("05".to_string()));
        assert_eq!(PowerState::On.to_string(), "ON");
        assert_eq!(PowerState::Off.to_string(), "OFF");
    }
}
