//! Configuration types for the DDNS system
//!
//! This module defines the configuration document consumed by the daemon and
//! the template that is written when no document exists yet.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder written into the template's provider id field
pub const PLACEHOLDER_ID: &str = "YOUR_DNSPOD_ID";

/// Placeholder written into the template's provider token field
pub const PLACEHOLDER_TOKEN: &str = "YOUR_DNSPOD_TOKEN";

/// Returns true when a credential still holds template text
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let upper = trimmed.to_ascii_uppercase();
    trimmed == PLACEHOLDER_ID
        || trimmed == PLACEHOLDER_TOKEN
        || upper.starts_with("YOUR_")
        || upper.contains("REPLACE_ME")
}

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// The record kept in sync
    pub record: RecordConfig,

    /// Public address source
    pub ip_source: IpSourceConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// The document written when no configuration file exists
    ///
    /// Credentials hold placeholder text so a daemon started against an
    /// unedited template stops with a configuration error.
    pub fn template() -> Self {
        Self {
            provider: ProviderConfig::Dnspod {
                id: PLACEHOLDER_ID.to_string(),
                token: PLACEHOLDER_TOKEN.to_string(),
                api_base: None,
            },
            record: RecordConfig::new("example.com", "www"),
            ip_source: IpSourceConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.record.validate()?;
        self.ip_source.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// DNSPod provider
    Dnspod {
        /// API token id
        id: String,
        /// API token secret
        token: String,
        /// Override for the API endpoint (defaults to https://dnsapi.cn)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_base: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Dnspod { id, token, .. } => {
                if is_placeholder(id) || is_placeholder(token) {
                    return Err(crate::Error::config(
                        "DNSPod credentials are missing or still set to the template placeholder",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Dnspod { .. } => "dnspod",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// The DNS record kept in sync with the public address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Zone managed at the provider (e.g., "example.com")
    pub domain: String,

    /// Host label inside the zone ("@" for the apex)
    pub subdomain: String,

    /// Record type
    #[serde(default = "default_record_type")]
    pub record_type: String,

    /// Desired time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Provider routing tag
    #[serde(default = "default_line")]
    pub line: String,
}

impl RecordConfig {
    /// Create a new record configuration with default type, TTL and line
    pub fn new(domain: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subdomain: subdomain.into(),
            record_type: default_record_type(),
            ttl: default_ttl(),
            line: default_line(),
        }
    }

    /// Set the desired TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fully qualified name, for logs
    pub fn fqdn(&self) -> String {
        if self.subdomain.is_empty() || self.subdomain == "@" {
            self.domain.clone()
        } else {
            format!("{}.{}", self.subdomain, self.domain)
        }
    }

    /// Validate the record configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.trim().is_empty() {
            return Err(crate::Error::config("record.domain cannot be empty"));
        }
        if self.subdomain.trim().is_empty() {
            return Err(crate::Error::config(
                "record.subdomain cannot be empty (use \"@\" for the zone apex)",
            ));
        }
        if self.record_type != "A" {
            return Err(crate::Error::config(format!(
                "record.record_type '{}' is not supported. Supported types: A",
                self.record_type
            )));
        }
        if self.ttl == 0 {
            return Err(crate::Error::config("record.ttl must be > 0"));
        }
        Ok(())
    }
}

fn default_record_type() -> String {
    "A".to_string()
}

fn default_ttl() -> u32 {
    600
}

fn default_line() -> String {
    "默认".to_string()
}

/// Public address source configuration
///
/// The endpoint returns either a bare array of `{"Ip": .., "Type": ..}`
/// objects or an object wrapping such an array under `array_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSourceConfig {
    /// URL to fetch the address from
    pub url: String,

    /// Name of the wrapping array; empty means the body is searched directly
    #[serde(default)]
    pub array_key: String,

    /// Key used to select the element
    #[serde(default = "default_match_key")]
    pub match_key: String,

    /// Value `match_key` must carry
    #[serde(default = "default_match_value")]
    pub match_value: String,

    /// Field holding the address in the selected element
    #[serde(default = "default_field")]
    pub field: String,
}

impl IpSourceConfig {
    /// Registry key for the source implementation
    pub fn type_name(&self) -> &str {
        "http"
    }

    /// Validate the address source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("ip_source.url cannot be empty"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "ip_source.url must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.match_key.is_empty() || self.field.is_empty() {
            return Err(crate::Error::config(
                "ip_source.match_key and ip_source.field cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        Self {
            url: "https://ip.example.net/json".to_string(),
            array_key: String::new(),
            match_key: default_match_key(),
            match_value: default_match_value(),
            field: default_field(),
        }
    }
}

fn default_match_key() -> String {
    "Type".to_string()
}

fn default_match_value() -> String {
    "IPv4".to_string()
}

fn default_field() -> String {
    "Ip".to_string()
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between reconciliation cycles; 0 runs a single pass
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Deadline for each network operation (in seconds)
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Seconds between heartbeat reports of the runtime counters; 0 disables them
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Whether the engine runs exactly one pass
    pub fn is_single_shot(&self) -> bool {
        self.interval_secs == 0
    }

    /// Cycle cadence
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-operation deadline
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Heartbeat period
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.operation_timeout_secs == 0 {
            return Err(crate::Error::config(
                "engine.operation_timeout_secs must be > 0",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "engine.event_channel_capacity must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_operation_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    3600
}

fn default_event_channel_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DdnsConfig {
        DdnsConfig {
            provider: ProviderConfig::Dnspod {
                id: "12345".to_string(),
                token: "abcdef0123456789".to_string(),
                api_base: None,
            },
            ..DdnsConfig::template()
        }
    }

    #[test]
    fn template_is_rejected_until_edited() {
        let err = DdnsConfig::template().validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder(PLACEHOLDER_ID));
        assert!(is_placeholder(PLACEHOLDER_TOKEN));
        assert!(is_placeholder("  "));
        assert!(is_placeholder("your_token_here"));
        assert!(!is_placeholder("12345"));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let json = r#"{
            "provider": {"type": "dnspod", "id": "1", "token": "t"},
            "record": {"domain": "example.com", "subdomain": "home"},
            "ip_source": {"url": "https://ip.example.net/json"}
        }"#;
        let config: DdnsConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.record.ttl, 600);
        assert_eq!(config.record.record_type, "A");
        assert_eq!(config.record.line, "默认");
        assert_eq!(config.ip_source.match_value, "IPv4");
        assert_eq!(config.engine.interval_secs, 300);
        assert_eq!(config.record.fqdn(), "home.example.com");
    }

    #[test]
    fn unsupported_record_type_is_fatal() {
        let mut config = valid();
        config.record.record_type = "AAAA".to_string();
        assert!(config.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn zero_interval_means_single_shot() {
        let engine = EngineConfig {
            interval_secs: 0,
            ..EngineConfig::default()
        };
        assert!(engine.is_single_shot());
        assert!(!EngineConfig::default().is_single_shot());
    }
}
