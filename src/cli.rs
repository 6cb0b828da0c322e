//! CLI command implementations for Hivelog.

pub(crate) mod layout;
pub(crate) mod run;
pub(crate) mod sweep;
pub(crate) mod watch;

mod output;

use clap::ValueEnum;
use hivelog::SimConfig;
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Output format for the `run` and `layout` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Output format for the `sweep` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SweepFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
    /// CSV format.
    Csv,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<hivelog::SimError> for CliError {
    fn from(e: hivelog::SimError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<hivelog::LayoutError> for CliError {
    fn from(e: hivelog::LayoutError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON serialization failed: {e}"))
    }
}

/// Load the config file if given, then apply the tick override.
pub(crate) fn load_config(path: Option<&Path>, ticks: Option<u32>) -> Result<SimConfig, CliError> {
    let mut config = match path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(ticks) = ticks {
        config.ticks = ticks;
    }
    config.validate()?;
    Ok(config)
}

/// Seed from the clock when none is given.
pub(crate) fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() ^ u64::from(d.subsec_nanos()))
            .unwrap_or(42)
    })
}
