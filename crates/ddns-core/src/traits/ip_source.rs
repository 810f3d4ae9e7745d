// # IP Source Trait
//
// Defines how the engine learns the host's current public address.
//
// ## Implementations
//
// - HTTPS lookup service: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpSource;
//
// async fn show(source: &dyn IpSource) -> ddns_core::Result<()> {
//     println!("public address: {}", source.current().await?);
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for IP source implementations
///
/// The engine asks for the address once per cycle, under the operation
/// deadline. The returned string becomes the desired record value verbatim.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS requests to the configured lookup endpoint
/// - ✅ Parse and validate the response
///
/// ## Forbidden Capabilities
/// - ❌ Perform DNS updates (use `DnsProvider`)
/// - ❌ Implement retry logic (use `DdnsEngine`)
/// - ❌ Spawn polling loops; the engine owns the schedule
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: the address, already validated by the source
    /// - `Err(Error)`: the lookup failed or returned nothing usable
    async fn current(&self) -> Result<String, crate::Error>;

    /// Short label used in logs
    fn source_name(&self) -> &'static str {
        "ip-source"
    }
}

/// Helper trait for constructing IP sources from configuration
pub trait IpSourceFactory: Send + Sync {
    /// Create an IpSource instance from configuration
    fn create(
        &self,
        config: &crate::config::IpSourceConfig,
    ) -> Result<Box<dyn IpSource>, crate::Error>;
}
