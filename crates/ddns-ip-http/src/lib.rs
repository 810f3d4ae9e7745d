// # HTTP IP Source
//
// This crate provides an HTTPS-based public address source for the DDNS system.
//
// ## Response Shapes
//
// Lookup services answer with JSON in one of two layouts, both handled by
// the core query engine:
//
// ```text
// [{"Ip": "203.0.113.7", "Type": "IPv4"}, {"Ip": "2001:db8::7", "Type": "IPv6"}]
// {"success": true, "data": [{"Ip": "203.0.113.7", "Type": "IPv4"}]}
// ```
//
// The element is selected by `match_key`/`match_value` (default `"Type"` /
// `"IPv4"`) and the address read from `field` (default `"Ip"`). When
// `array_key` is empty the first array in the body is searched. A body that
// is nothing but a dotted quad is accepted as well.
//
// Selection is first-match: if a service lists several IPv4 entries, the
// first one in the document wins.

use ddns_core::ProviderRegistry;
use ddns_core::config::IpSourceConfig;
use ddns_core::traits::{IpSource, IpSourceFactory};
use ddns_core::{Error, HttpTransport, JsonView, ParseError, Result, decode_unicode_escapes};
use std::net::Ipv4Addr;

/// User agent sent with every lookup
const USER_AGENT: &str = concat!("ddnsd/", env!("CARGO_PKG_VERSION"));

/// HTTPS JSON address source
#[derive(Debug)]
pub struct HttpIpSource {
    /// URL and selection rules
    config: IpSourceConfig,

    /// gzip-aware HTTP transport
    transport: HttpTransport,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    pub fn new(config: IpSourceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport: HttpTransport::new("http", USER_AGENT)?,
            config,
        })
    }

    /// The lookup URL
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

/// Pull the IPv4 address out of a decoded lookup response
pub fn parse_address(body: &[u8], config: &IpSourceConfig) -> Result<String> {
    let plain = String::from_utf8_lossy(body);
    if plain.trim().parse::<Ipv4Addr>().is_ok() {
        return Ok(plain.trim().to_string());
    }

    let view = JsonView::new(body);
    if let Ok(false) = view.get_bool("success") {
        let message = view
            .get_string("message")
            .or_else(|_| view.get_string("msg"))
            .map(|m| decode_unicode_escapes(&m))
            .unwrap_or_else(|_| "no message".to_string());
        return Err(Error::provider(
            "http",
            format!("address lookup refused: {}", message),
        ));
    }

    let raw = if config.array_key.is_empty() {
        view.quick_get_string_from_array(&config.match_key, &config.match_value, &config.field)?
    } else {
        view.get_string_from_array(
            &config.array_key,
            &config.match_key,
            &config.match_value,
            &config.field,
        )?
    };

    let address = raw.trim();
    if address.parse::<Ipv4Addr>().is_err() {
        return Err(ParseError::TypeMismatch {
            key: config.field.clone(),
            expected: "IPv4 address",
        }
        .into());
    }
    Ok(address.to_string())
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<String> {
        let body = self.transport.get(&self.config.url).await?;
        let address = parse_address(&body, &self.config)?;
        tracing::debug!("{} reported {}", self.config.url, address);
        Ok(address)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP IP sources
pub struct HttpFactory;

impl IpSourceFactory for HttpFactory {
    fn create(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        Ok(Box::new(HttpIpSource::new(config.clone())?))
    }
}

/// Register the HTTP IP source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_ip_source("http", Box::new(HttpFactory));
}
