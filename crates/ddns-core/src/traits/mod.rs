//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Report the host's current public address
//! - [`DnsProvider`]: Read and write the managed record at the provider

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::{IpSource, IpSourceFactory};
pub use dns_provider::{DnsProvider, DnsProviderFactory};
