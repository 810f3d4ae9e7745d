//! Minimal embedding example for ddns-core
//!
//! Runs the engine inside an application with in-process components: an
//! address source the application controls and an in-memory zone standing in
//! for DNSPod. The application decides when the engine stops.

use ddns_core::config::{DdnsConfig, EngineConfig, IpSourceConfig, ProviderConfig, RecordConfig};
use ddns_core::traits::{DnsProvider, IpSource};
use ddns_core::{DdnsEngine, DesiredState, RecordQuery, RemoteRecord, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Address source driven by the application
struct EmbeddedIpSource {
    address: Mutex<String>,
}

impl EmbeddedIpSource {
    fn new(address: &str) -> Self {
        Self {
            address: Mutex::new(address.to_string()),
        }
    }

    /// Simulate the uplink receiving a new address
    fn set(&self, address: &str) {
        *self.address.lock().unwrap_or_else(|e| e.into_inner()) = address.to_string();
    }
}

#[async_trait::async_trait]
impl IpSource for EmbeddedIpSource {
    async fn current(&self) -> Result<String> {
        Ok(self.address.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn source_name(&self) -> &'static str {
        "embedded"
    }
}

/// In-memory zone keyed by (subdomain, type)
#[derive(Default)]
struct EmbeddedZone {
    records: Mutex<HashMap<(String, String), RemoteRecord>>,
    writes: AtomicUsize,
}

impl EmbeddedZone {
    fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DnsProvider for EmbeddedZone {
    async fn list_record(&self, query: &RecordQuery) -> Result<Option<RemoteRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .get(&(query.subdomain.clone(), query.record_type.clone()))
            .cloned())
    }

    async fn create_record(&self, desired: &DesiredState) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let id = format!("embedded-{}", records.len() + 1);
        records.insert(
            (desired.subdomain.clone(), desired.record_type.clone()),
            RemoteRecord {
                id,
                value: desired.value.clone(),
                ttl: desired.ttl,
            },
        );
        Ok(())
    }

    async fn modify_record(&self, id: &str, desired: &DesiredState) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(
            (desired.subdomain.clone(), desired.record_type.clone()),
            RemoteRecord {
                id: id.to_string(),
                value: desired.value.clone(),
                ttl: desired.ttl,
            },
        );
        Ok(())
    }

    fn check_credentials(&self) -> Result<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let ip_source = Arc::new(EmbeddedIpSource::new("192.0.2.10"));
    let zone = Arc::new(EmbeddedZone::default());

    // Provider and source sections are not consulted for injected components
    let config = DdnsConfig {
        provider: ProviderConfig::Custom {
            factory: "embedded".to_string(),
            config: serde_json::json!({}),
        },
        record: RecordConfig::new("example.com", "home").with_ttl(120),
        ip_source: IpSourceConfig::default(),
        engine: EngineConfig {
            interval_secs: 1,
            operation_timeout_secs: 2,
            heartbeat_secs: 0,
            event_channel_capacity: 16,
        },
    };

    let (engine, mut events) = DdnsEngine::new(ip_source.clone(), zone.clone(), config)?;

    let listener = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("[event] {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // First cycle creates the record, the next ones find it unchanged
    tokio::time::sleep(Duration::from_millis(2500)).await;

    ip_source.set("192.0.2.77");
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let _ = shutdown_tx.send(());
    let result = match engine_handle.await {
        Ok(result) => result,
        Err(e) => return Err(ddns_core::Error::config(format!("engine task failed: {}", e))),
    };
    let _ = tokio::time::timeout(Duration::from_millis(100), listener).await;

    info!(
        writes = zone.write_count(),
        "Engine stopped: {:?}",
        result
    );
    result
}
