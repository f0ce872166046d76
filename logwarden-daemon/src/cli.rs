//! CLI argument definitions for logwarden-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use logwarden_core::{ConfigError, LogwardenConfig, LogwardenError};

/// Mobile device log watcher.
///
/// Streams logs from an Android, iOS or HarmonyOS device, matches them
/// against configured behaviors and writes every notification to stdout
/// as one JSON object per line.
#[derive(Parser, Debug)]
#[command(name = "logwarden-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logwarden.toml configuration file.
    ///
    /// A missing file falls back to built-in defaults.
    #[arg(short, long, default_value = "logwarden.toml")]
    pub config: PathBuf,

    /// Platform to collect from (android, ios, harmonyos).
    #[arg(short, long, required_unless_present = "validate")]
    pub platform: Option<String>,

    /// Only forward lines containing this tag (case-insensitive).
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Override behavior definitions file (YAML or JSON).
    #[arg(long)]
    pub behaviors: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting collection.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Load the configuration this invocation asks for.
    ///
    /// Order of precedence: CLI flags, then `LOGWARDEN_*` environment
    /// variables, then the config file, then defaults.
    pub async fn resolve_config(&self) -> Result<LogwardenConfig> {
        let mut config = match LogwardenConfig::from_file(&self.config).await {
            Ok(config) => config,
            Err(LogwardenError::Config(ConfigError::FileNotFound { .. })) => {
                LogwardenConfig::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to load config from {}: {}",
                    self.config.display(),
                    e
                ));
            }
        };

        config.apply_env_overrides();
        self.apply_overrides(&mut config);

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
        Ok(config)
    }

    /// Apply CLI flag overrides on top of an already loaded config.
    pub fn apply_overrides(&self, config: &mut LogwardenConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(path) = &self.behaviors {
            config.behaviors.config_path = path.clone();
        }
    }
}
