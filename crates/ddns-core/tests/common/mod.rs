//! Test doubles and common utilities for architecture contract tests
//!
//! The doubles keep their state behind `Arc`, so a test hands the engine an
//! `Arc<dyn Trait>` clone and keeps its own handle for assertions.

#![allow(dead_code)]

use ddns_core::config::{DdnsConfig, ProviderConfig, RecordConfig};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsProvider, IpSource};
use ddns_core::{DesiredState, EngineEvent, RecordQuery, RemoteRecord};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Take one unit from a failure budget, returning whether one was available
fn consume(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// An IpSource returning a settable address, optionally after a delay
pub struct ScriptedIpSource {
    address: Mutex<String>,
    delay: Duration,
    calls: AtomicUsize,
    started: Mutex<Vec<Instant>>,
}

impl ScriptedIpSource {
    pub fn new(address: &str) -> Self {
        Self::with_delay(address, Duration::ZERO)
    }

    /// Every lookup takes `delay` before answering
    pub fn with_delay(address: &str, delay: Duration) -> Self {
        Self {
            address: Mutex::new(address.to_string()),
            delay,
            calls: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Change the address reported from now on
    pub fn set_address(&self, address: &str) {
        *self.address.lock().unwrap() = address.to_string();
    }

    /// Number of times current() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// When each call to current() began
    pub fn call_times(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(Instant::now());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.address.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// An in-memory record store holding at most one record
pub struct FakeZone {
    record: Mutex<Option<RemoteRecord>>,
    lists: AtomicUsize,
    creates: AtomicUsize,
    modifies: AtomicUsize,
    /// Upcoming list calls that fail with a transport error
    list_failures: AtomicUsize,
    /// Upcoming list calls that never complete
    list_hangs: AtomicUsize,
    placeholder_credentials: AtomicBool,
}

impl FakeZone {
    /// An empty zone
    pub fn new() -> Self {
        Self {
            record: Mutex::new(None),
            lists: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            modifies: AtomicUsize::new(0),
            list_failures: AtomicUsize::new(0),
            list_hangs: AtomicUsize::new(0),
            placeholder_credentials: AtomicBool::new(false),
        }
    }

    /// A zone already holding `value` with `ttl`
    pub fn with_record(value: &str, ttl: u32) -> Self {
        let zone = Self::new();
        zone.put(value, ttl);
        zone
    }

    /// Overwrite the stored record behind the engine's back
    pub fn put(&self, value: &str, ttl: u32) {
        *self.record.lock().unwrap() = Some(RemoteRecord {
            id: "rec-1".to_string(),
            value: value.to_string(),
            ttl,
        });
    }

    pub fn record(&self) -> Option<RemoteRecord> {
        self.record.lock().unwrap().clone()
    }

    pub fn fail_next_lists(&self, count: usize) {
        self.list_failures.store(count, Ordering::SeqCst);
    }

    pub fn hang_next_lists(&self, count: usize) {
        self.list_hangs.store(count, Ordering::SeqCst);
    }

    pub fn use_placeholder_credentials(&self) {
        self.placeholder_credentials.store(true, Ordering::SeqCst);
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn modify_count(&self) -> usize {
        self.modifies.load(Ordering::SeqCst)
    }

    /// Every call that reached the "network"
    pub fn network_calls(&self) -> usize {
        self.list_count() + self.create_count() + self.modify_count()
    }
}

#[async_trait::async_trait]
impl DnsProvider for FakeZone {
    async fn list_record(&self, _query: &RecordQuery) -> Result<Option<RemoteRecord>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if consume(&self.list_hangs) {
            std::future::pending::<()>().await;
        }
        if consume(&self.list_failures) {
            return Err(Error::transport("connection reset by peer"));
        }
        Ok(self.record())
    }

    async fn create_record(&self, desired: &DesiredState) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.put(&desired.value, desired.ttl);
        Ok(())
    }

    async fn modify_record(&self, id: &str, desired: &DesiredState) -> Result<()> {
        self.modifies.fetch_add(1, Ordering::SeqCst);
        assert_eq!(id, "rec-1", "modify must target the listed record");
        self.put(&desired.value, desired.ttl);
        Ok(())
    }

    fn check_credentials(&self) -> Result<()> {
        if self.placeholder_credentials.load(Ordering::SeqCst) {
            return Err(Error::config("credentials still hold template placeholders"));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// A valid configuration for `home.example.com`
///
/// `interval_secs` of 0 gives a single-shot engine. Heartbeats are off.
pub fn test_config(interval_secs: u64) -> DdnsConfig {
    let mut config = DdnsConfig::template();
    config.provider = ProviderConfig::Dnspod {
        id: "12345".to_string(),
        token: "0123456789abcdef".to_string(),
        api_base: None,
    };
    config.record = RecordConfig::new("example.com", "home");
    config.engine.interval_secs = interval_secs;
    config.engine.operation_timeout_secs = 10;
    config.engine.heartbeat_secs = 0;
    config
}

/// Everything currently queued on the event channel
pub fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Let spawned workers observe cancellation
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
