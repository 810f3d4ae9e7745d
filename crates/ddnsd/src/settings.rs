//! Daemon settings: configuration file, template generation and environment overrides

use anyhow::{Context, Result, bail};
use ddns_core::DdnsConfig;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Configuration file used when `DDNS_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "ddns.json";

/// Outcome of looking for the configuration file
#[derive(Debug)]
pub enum Loaded {
    /// The file existed and parsed
    Ready(DdnsConfig),
    /// No file existed; a template was written at this path
    TemplateWritten(PathBuf),
}

/// Settings read from the environment
///
/// - `DDNS_CONFIG`: path to the JSON configuration (default `ddns.json`)
/// - `DDNS_INTERVAL_SECS`: overrides `engine.interval_secs` (0 = single pass)
/// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)
///
/// `DDNS_MODE=dry-run` is read by the DNSPod provider factory, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub interval_override: Option<u64>,
    pub log_level: String,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let interval_override = match lookup("DDNS_INTERVAL_SECS") {
            Some(raw) => Some(raw.trim().parse::<u64>().with_context(|| {
                format!("DDNS_INTERVAL_SECS must be a whole number of seconds. Got: {}", raw)
            })?),
            None => None,
        };

        let settings = Self {
            config_path: lookup("DDNS_CONFIG")
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
                .into(),
            interval_override,
            log_level: lookup("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };
        settings.level()?;
        Ok(settings)
    }

    /// Tracing level named by `DDNS_LOG_LEVEL`
    pub fn level(&self) -> Result<Level> {
        Ok(match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        })
    }

    /// Apply environment overrides on top of the file's settings
    pub fn apply(&self, config: &mut DdnsConfig) {
        if let Some(interval) = self.interval_override {
            config.engine.interval_secs = interval;
        }
    }
}

/// Read the configuration at `path`, or write a template there if it is missing
pub fn load_config(path: &Path) -> Result<Loaded> {
    if !path.exists() {
        let template = serde_json::to_string_pretty(&DdnsConfig::template())
            .context("Failed to render configuration template")?;
        std::fs::write(path, template + "\n")
            .with_context(|| format!("Failed to write configuration template to {}", path.display()))?;
        return Ok(Loaded::TemplateWritten(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Loaded::Ready(config))
}
