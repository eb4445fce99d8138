//! MQTT bridge for Epson projectors speaking ESC/VP.net.
//!
//! Connects to the broker, announces the projector's entities, forwards
//! commands and publishes polled state. Reconnects forever on broker
//! failures.

use std::sync::Arc;

use anyhow::{Context, Result};
use mqtt_bridge_escvp::commands::CommandTable;
use mqtt_bridge_escvp::config::EscVpBridgeConfig;
use mqtt_bridge_escvp::escvp::EscVpClient;
use mqtt_bridge_escvp::session::{BRIDGE_NAME, EscVpSessionFactory};
use tokio_util::sync::CancellationToken;
use tracing::info;
use vpbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, init_tracing, shutdown_signal};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("escvp.json5");

    // Load configuration
    let config = EscVpBridgeConfig::load(args.config.as_deref())
        .with_context(|| format!("Failed to load config (file: {:?})", args.config))?;

    // Initialize logging
    init_tracing(&args.logging(&config.logging))
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        projector = %config.projector.address(),
        device = %config.projector.name(),
        "Starting mqtt-bridge-escvp"
    );

    let table = Arc::new(CommandTable::epson().context("Invalid built-in command table")?);
    let device = Arc::new(
        EscVpClient::new(
            config.projector.address(),
            config.projector.timeout(),
            table.clone(),
        )
        .with_power_timeout(config.projector.power_timeout()),
    );

    let runner = BridgeRunner::new(BRIDGE_NAME, config.reconnect_interval());
    let mut factory = EscVpSessionFactory::new(config, table, device)
        .context("Failed to prepare bridge session")?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    runner.run(&mut factory, shutdown).await;

    info!("ESC/VP.net bridge stopped");
    Ok(())
}
