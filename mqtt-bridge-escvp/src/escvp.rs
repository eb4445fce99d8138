//! ESC/VP.net client.
//!
//! ESC/VP.net wraps the ESC/VP21 ASCII command set in a TCP session:
//!
//! ```text
//! client: "ESC/VP.net" 0x10 0x03 0x00 0x00 0x00 0x00     (16 bytes)
//! device: "ESC/VP.net" 0x10 0x03 0x00 0x00 0x20 0x00     (status 0x20 = OK)
//! client: "PWR?\r"
//! device: "PWR=01\r:"
//! client: "PWR ON\r"
//! device: ":"                                           ("ERR\r:" on failure)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::commands::{CommandDefinition, CommandTable, POWER_OFF, POWER_ON};
use crate::device::{DeviceClient, DeviceError, PowerState};

/// Default ESC/VP.net TCP port.
pub const DEFAULT_PORT: u16 = 3629;

/// Default timeout for power on/off, which the projector acknowledges
/// only once warm-up or cool-down has finished.
pub const DEFAULT_POWER_TIMEOUT: Duration = Duration::from_secs(40);

/// Connect request sent right after the TCP connection opens.
pub const HANDSHAKE: [u8; 16] = *b"ESC/VP.net\x10\x03\x00\x00\x00\x00";

const HEADER_MAGIC: &[u8] = b"ESC/VP.net";
const STATUS_OK: u8 = 0x20;
const PROMPT: u8 = b':';

/// Check the projector's reply to [`HANDSHAKE`].
pub fn check_handshake(reply: &[u8]) -> Result<(), DeviceError> {
    if reply.len() < HANDSHAKE.len() || !reply.starts_with(HEADER_MAGIC) {
        return Err(DeviceError::Handshake(format!(
            "unexpected reply {:02x?}",
            reply
        )));
    }
    match reply[14] {
        STATUS_OK => Ok(()),
        status => Err(DeviceError::Handshake(format!(
            "projector answered with status 0x{:02x}",
            status
        ))),
    }
}

/// Frame a command for the wire.
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(command.len() + 1);
    frame.extend_from_slice(command.as_bytes());
    frame.push(b'\r');
    frame
}

/// Parse a response read up to and including the `:` prompt.
///
/// Returns the value of a `KEY=VALUE` answer, or `None` for a bare
/// acknowledgement.
///
/// # Example
/// ```
/// use mqtt_bridge_escvp::escvp::parse_response;
///
/// assert_eq!(parse_response("PWR?", b"PWR=01\r:").unwrap().as_deref(), Some("01"));
/// assert_eq!(parse_response("PWR ON", b":").unwrap(), None);
/// assert!(parse_response("PWR ON", b"ERR\r:").is_err());
/// ```
pub fn parse_response(command: &str, response: &[u8]) -> Result<Option<String>, DeviceError> {
    let text = String::from_utf8_lossy(response);
    let body = text
        .strip_suffix(PROMPT as char)
        .ok_or_else(|| DeviceError::Protocol {
            command: command.to_string(),
            response: text.to_string(),
        })?
        .trim();

    if body.is_empty() {
        return Ok(None);
    }
    if body == "ERR" {
        return Err(DeviceError::Rejected {
            command: command.to_string(),
        });
    }

    match body.split_once('=') {
        Some((_, value)) => Ok(Some(value.trim().to_string())),
        None => Err(DeviceError::Protocol {
            command: command.to_string(),
            response: body.to_string(),
        }),
    }
}

type Connection = BufReader<TcpStream>;

/// TCP client for one projector.
///
/// The connection is opened on first use and kept for later requests.
/// Requests are serialized; any I/O error or timeout drops the
/// connection so the next request reconnects.
pub struct EscVpClient {
    address: String,
    timeout: Duration,
    power_timeout: Duration,
    table: Arc<CommandTable>,
    connection: Mutex<Option<Connection>>,
}

impl EscVpClient {
    /// Create a client; no connection is made until the first request.
    pub fn new(address: impl Into<String>, timeout: Duration, table: Arc<CommandTable>) -> Self {
        Self {
            address: address.into(),
            timeout,
            power_timeout: DEFAULT_POWER_TIMEOUT,
            table,
            connection: Mutex::new(None),
        }
    }

    /// Override the timeout used for `PWR ON` and `PWR OFF`.
    pub fn with_power_timeout(mut self, timeout: Duration) -> Self {
        self.power_timeout = timeout;
        self
    }

    /// Time allowed for `command` to be answered.
    pub fn timeout_for(&self, command: &str) -> Duration {
        if command == POWER_ON || command == POWER_OFF {
            self.power_timeout
        } else {
            self.timeout
        }
    }

    /// The `host:port` this client talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connect(address: &str) -> Result<Connection, DeviceError> {
        let mut stream = TcpStream::connect(address).await?;
        stream.write_all(&HANDSHAKE).await?;

        let mut reply = [0u8; HANDSHAKE.len()];
        stream.read_exact(&mut reply).await?;
        check_handshake(&reply)?;

        tracing::info!(projector = %address, "Connected to projector");
        Ok(BufReader::new(stream))
    }

    async fn exchange(connection: &mut Connection, command: &str) -> Result<Vec<u8>, DeviceError> {
        connection
            .get_mut()
            .write_all(&encode_command(command))
            .await?;

        let mut response = Vec::new();
        let read = connection.read_until(PROMPT, &mut response).await?;
        if read == 0 {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "projector closed the connection",
            )));
        }
        Ok(response)
    }

    /// Send one command and return its parsed response.
    async fn request(&self, command: &str) -> Result<Option<String>, DeviceError> {
        let timeout = self.timeout_for(command);
        let mut slot = self.connection.lock().await;

        let transaction = async {
            let mut connection = match slot.take() {
                Some(connection) => connection,
                None => Self::connect(&self.address).await?,
            };
            let response = Self::exchange(&mut connection, command).await?;
            *slot = Some(connection);
            Ok::<_, DeviceError>(response)
        };

        // On error or timeout the connection was taken out of the slot and is dropped here.
        let response = tokio::time::timeout(timeout, transaction)
            .await
            .map_err(|_| DeviceError::Timeout(timeout))??;

        tracing::trace!(command = %command, response = ?String::from_utf8_lossy(&response), "ESC/VP21 exchange");
        parse_response(command, &response)
    }

    async fn query(&self, command: &str) -> Result<String, DeviceError> {
        self.request(command)
            .await?
            .ok_or_else(|| DeviceError::Protocol {
                command: command.to_string(),
                response: String::new(),
            })
    }

    async fn query_int(&self, key: &str) -> Result<i64, DeviceError> {
        let command = format!("{}?", key);
        let value = self.query(&command).await?;
        value.parse().map_err(|_| DeviceError::Protocol {
            command,
            response: value,
        })
    }
}

#[async_trait]
impl DeviceClient for EscVpClient {
    async fn get_power(&self) -> Result<PowerState, DeviceError> {
        let code = self.query("PWR?").await?;
        Ok(PowerState::from_code(&code))
    }

    async fn read_config_value(&self, key: &str) -> Result<i64, DeviceError> {
        match self.table.get(key) {
            Some(CommandDefinition::Ranged(setting)) => {
                let raw = self.query_int(&setting.key).await?;
                Ok(setting.to_human(raw))
            }
            Some(CommandDefinition::Readout(readout)) => self.query_int(&readout.key).await,
            _ => Err(DeviceError::UnsupportedKey(key.to_string())),
        }
    }

    async fn get_property(&self, command: &str) -> Result<String, DeviceError> {
        self.query(command).await
    }

    async fn send_command(&self, command: &str) -> Result<(), DeviceError> {
        self.request(command).await.map(|_| ())
    }

    async fn send_config_value(&self, key: &str, value: &str) -> Result<(), DeviceError> {
        let Some(CommandDefinition::Ranged(setting)) = self.table.get(key) else {
            return Err(DeviceError::UnsupportedKey(key.to_string()));
        };

        let human = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| DeviceError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;

        let raw = setting.to_raw(human.round() as i64);
        self.send_command(&format!("{} {}", setting.key, raw)).await
    }
}
