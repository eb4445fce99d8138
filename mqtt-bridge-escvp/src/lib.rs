//! MQTT bridge for Epson projectors speaking ESC/VP.net.
//!
//! This bridge polls a projector over ESC/VP.net and publishes its state to
//! an MQTT broker, and forwards commands received on the broker to the
//! projector.
//!
//! # Topics
//!
//! ```text
//! <base>/command/<key>            commands (payload = value)
//! <base>/command/power            "OFF" switches off, anything else on
//! <base>/state/<key>              ranged settings and readouts
//! <base>/state/<device>_power     "ON" / "OFF"
//! <base>/state/<device>_<key>     enum settings (option label)
//! <base>/status                   bridge status (JSON)
//! ```
//!
//! Where:
//! - `<base>` - Base topic from configuration (default `epson`)
//! - `<device>` - Projector name (defaults to its host)
//! - `<key>` - Key from the [`commands::CommandTable`]

pub mod commands;
pub mod config;
pub mod device;
pub mod discovery;
pub mod dispatcher;
pub mod escvp;
pub mod poller;
pub mod session;
