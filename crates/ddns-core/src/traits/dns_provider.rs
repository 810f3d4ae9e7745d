// # DNS Provider Trait
//
// Defines the record-store capability the reconciler drives.
//
// ## Implementations
//
// - DNSPod: `ddns-provider-dnspod` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{DnsProvider, RecordQuery};
//
// async fn show(provider: &dyn DnsProvider, query: &RecordQuery) -> ddns_core::Result<()> {
//     match provider.list_record(query).await? {
//         Some(record) => println!("{} -> {} (ttl {})", record.id, record.value, record.ttl),
//         None => println!("record absent"),
//     }
//     Ok(())
// }
// ```

use crate::reconcile::{DesiredState, RecordQuery, RemoteRecord};
use async_trait::async_trait;

/// Trait for DNS provider implementations
///
/// A provider exposes three remote operations (list, create, modify) and a
/// local credential check. The engine wraps every remote call in the bounded
/// executor, so implementations are shared as `Arc<dyn DnsProvider>` and must
/// not borrow from the caller across an await point.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the engine decides what happens next)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff (owned by `DdnsEngine`)
/// - ❌ Decide whether an update is needed (owned by `reconcile`)
/// - ❌ Cache records between calls
///
/// A provider that retried internally would hide failures from the error
/// streak and could outlive the operation deadline. Return the error instead;
/// the next cycle tries again.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the record matching `query`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: the record exists with the queried type
    /// - `Ok(None)`: no record of that name and type exists
    /// - `Err(Error)`: the lookup itself failed
    async fn list_record(&self, query: &RecordQuery) -> Result<Option<RemoteRecord>, crate::Error>;

    /// Create the record described by `desired`
    async fn create_record(&self, desired: &DesiredState) -> Result<(), crate::Error>;

    /// Overwrite record `id` with the value and TTL in `desired`
    async fn modify_record(&self, id: &str, desired: &DesiredState) -> Result<(), crate::Error>;

    /// Reject placeholder or missing credentials without touching the network
    fn check_credentials(&self) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
