// # ddns-core
//
// Core library for the DNSPod-style DDNS reconciler.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for fetching the host's public address
// - **DnsProvider**: Trait for reading and writing the managed record
// - **BoundedExecutor**: Runs every network call under a deadline
// - **decoder**: gzip gate plus a zero-copy JSON query engine for provider responses
// - **reconcile**: Pure decision function (create / update / no-op)
// - **DdnsEngine**: Single-shot or fixed-cadence scheduler over the above
// - **ProviderRegistry**: Plugin-based registry for providers and sources
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider bindings
// 2. **Bounded**: No network call can stall the scheduler past its deadline
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: A record that already matches is never written

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;
pub mod decoder;
pub mod executor;
pub mod reconcile;
pub mod stats;
pub mod transport;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider};
pub use engine::{DdnsEngine, EngineEvent};
pub use registry::ProviderRegistry;
pub use config::{DdnsConfig, EngineConfig, IpSourceConfig, ProviderConfig, RecordConfig};
pub use error::{Error, ParseError, Result};
pub use decoder::{JsonView, decode_body, decode_unicode_escapes};
pub use executor::BoundedExecutor;
pub use reconcile::{ApplyOutcome, DesiredState, DiffReason, ReconcileDecision, RecordQuery, RemoteRecord};
pub use stats::{RuntimeStats, StatsSnapshot};
pub use transport::HttpTransport;
