//! Bridge runner for connection lifecycle management.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Connection state of a running bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No broker connection; waiting before the next attempt.
    Disconnected,
    /// Establishing the broker connection.
    Connecting,
    /// A bridge session is running.
    Running,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Running => write!(f, "running"),
        }
    }
}

/// Creates broker connections and runs one bridge session on each.
#[async_trait]
pub trait SessionFactory: Send {
    /// The established connection handed to a session.
    type Connection: Send;

    /// Establish a fresh broker connection.
    async fn connect(&mut self) -> Result<Self::Connection>;

    /// Run one session until it fails or `cancel` fires.
    async fn run_session(
        &mut self,
        connection: Self::Connection,
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// Bridge runner that supervises the broker connection.
///
/// Handles:
/// - Connecting and starting a session
/// - Logging session failures
/// - Reconnecting after a fixed delay, forever
/// - Graceful shutdown when the shutdown token fires
///
/// # Example
///
/// ```ignore
/// use vpbridge_framework::{BridgeRunner, shutdown_signal};
/// use tokio_util::sync::CancellationToken;
///
/// let shutdown = CancellationToken::new();
/// let trigger = shutdown.clone();
/// tokio::spawn(async move {
///     shutdown_signal().await;
///     trigger.cancel();
/// });
///
/// BridgeRunner::new("escvp", Duration::from_secs(3))
///     .run(&mut factory, shutdown)
///     .await;
/// ```
pub struct BridgeRunner {
    /// Bridge name for logging.
    name: String,
    /// Delay between a failure and the next connection attempt.
    reconnect_interval: Duration,
    /// Published connection state.
    state: watch::Sender<ConnectionState>,
}

impl BridgeRunner {
    /// Create a new bridge runner.
    pub fn new(name: impl Into<String>, reconnect_interval: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            name: name.into(),
            reconnect_interval,
            state,
        }
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the reconnect interval.
    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(bridge = %self.name, from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Run sessions until `shutdown` fires.
    ///
    /// Every connection or session failure is logged, followed by one
    /// fixed delay and a new attempt. There is no attempt limit.
    pub async fn run<F: SessionFactory>(&self, factory: &mut F, shutdown: CancellationToken) {
        let mut attempt: u64 = 0;

        while !shutdown.is_cancelled() {
            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            tracing::info!(bridge = %self.name, attempt, "Connecting to broker");

            let connected = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                connected = factory.connect() => connected,
            };

            let outcome = match connected {
                Ok(connection) => {
                    self.set_state(ConnectionState::Running);
                    tracing::info!(bridge = %self.name, "Bridge session started");
                    factory
                        .run_session(connection, shutdown.child_token())
                        .await
                }
                Err(e) => Err(e),
            };

            self.set_state(ConnectionState::Disconnected);

            if shutdown.is_cancelled() {
                break;
            }

            match outcome {
                Ok(()) => tracing::warn!(bridge = %self.name, "Bridge session ended"),
                Err(e) => tracing::error!(bridge = %self.name, error = %e, "Bridge session failed"),
            }

            tracing::info!(
                bridge = %self.name,
                delay_secs = self.reconnect_interval.as_secs_f64(),
                "Reconnecting after delay"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!(bridge = %self.name, "Bridge stopped");
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Received shutdown signal");
}
