//! Plugin-based provider registry
//!
//! The registry allows DNS providers and IP sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! # use ddns_core::registry::ProviderRegistry;
//! // In ddns-provider-dnspod crate
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("dnspod", Box::new(DnspodFactory));
//! }
//! ```
//!
//! The daemon then builds whatever the configuration names:
//!
//! ```rust,ignore
//! let provider = registry.create_provider(&config.provider)?;
//! let source = registry.create_ip_source(&config.ip_source)?;
//! ```

use crate::config::{IpSourceConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, IpSource, IpSourceFactory};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Factories<F> = RwLock<HashMap<String, Box<F>>>;

fn read<F: ?Sized>(map: &Factories<F>) -> RwLockReadGuard<'_, HashMap<String, Box<F>>> {
    map.read().unwrap_or_else(|e| e.into_inner())
}

fn write<F: ?Sized>(map: &Factories<F>) -> RwLockWriteGuard<'_, HashMap<String, Box<F>>> {
    map.write().unwrap_or_else(|e| e.into_inner())
}

/// Provider registry for plugin-based component creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: Factories<dyn DnsProviderFactory>,

    /// Registered IP source factories
    ip_sources: Factories<dyn IpSourceFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under `name` (e.g., "dnspod")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        write(&self.providers).insert(name.into(), factory);
    }

    /// Register an IP source factory under `name` (e.g., "http")
    pub fn register_ip_source(&self, name: impl Into<String>, factory: Box<dyn IpSourceFactory>) {
        write(&self.ip_sources).insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the provider type is not registered or
    ///   the factory rejects the configuration
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = read(&self.providers);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an IP source from configuration
    pub fn create_ip_source(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        let source_type = config.type_name();
        let sources = read(&self.ip_sources);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown IP source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.providers).keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered IP source types
    pub fn list_ip_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.ip_sources).keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        read(&self.providers).contains_key(name)
    }

    /// Check if an IP source type is registered
    pub fn has_ip_source(&self, name: &str) -> bool {
        read(&self.ip_sources).contains_key(name)
    }
}
