//! CLI argument parsing for bridges.

use std::path::{Path, PathBuf};

use clap::Parser;

use vpbridge_common::LoggingConfig;

/// Common CLI arguments for all bridges.
#[derive(Parser, Debug, Clone)]
#[command(about = "vpbridge MQTT device bridge")]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5). Environment variables override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, the default is used when that
    /// file exists; otherwise the bridge runs from environment variables alone.
    pub fn parse_with_default(default_config: &str) -> Self {
        <Self as Parser>::parse().or_default_config(default_config)
    }

    /// Parse CLI arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Fill in `default_config` when no path was given and the file exists.
    pub fn or_default_config(mut self, default_config: &str) -> Self {
        if self.config.is_none() && Path::new(default_config).exists() {
            self.config = Some(PathBuf::from(default_config));
        }
        self
    }

    /// Logging configuration with the CLI level override applied.
    pub fn logging(&self, configured: &LoggingConfig) -> LoggingConfig {
        match &self.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: configured.format,
            },
            None => configured.clone(),
        }
    }
}
