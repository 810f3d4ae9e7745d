//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Fetching the public address via IpSource
//! - Reading the managed record via DnsProvider
//! - Reconciling the two and applying at most one change
//! - Keeping the cadence and the runtime counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  current()   ┌──────────────┐  list_record()  ┌─────────────┐
//! │  IpSource   │◄─────────────│  DdnsEngine  │────────────────►│ DnsProvider │
//! └─────────────┘              └──────────────┘                 └─────────────┘
//!                                 │        │   create / modify         ▲
//!                       reconcile │        └───────────────────────────┘
//!                                 ▼
//!                          ┌─────────────┐
//!                          │   Events    │
//!                          └─────────────┘
//! ```
//!
//! Every network call runs through the [`BoundedExecutor`], so a stuck remote
//! costs one operation deadline and never stalls the loop.
//!
//! ## Cycle Flow
//!
//! 1. Reject placeholder credentials (fatal, no network)
//! 2. Fetch the public address
//! 3. List the remote record
//! 4. Reconcile and apply
//! 5. Count the outcome; sleep until the next slot

use crate::config::{DdnsConfig, EngineConfig, RecordConfig};
use crate::error::Result;
use crate::executor::BoundedExecutor;
use crate::reconcile::{self, ApplyOutcome, DesiredState, DiffReason};
use crate::stats::{RuntimeStats, StatsSnapshot};
use crate::traits::{DnsProvider, IpSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        record: String,
        single_shot: bool,
    },

    /// A reconciliation cycle began
    CycleStarted {
        cycle: u64,
    },

    /// The record did not exist and was created
    RecordCreated {
        record: String,
        value: String,
    },

    /// The record existed with different contents and was modified
    RecordUpdated {
        record: String,
        value: String,
        reason: DiffReason,
    },

    /// The record already matched
    RecordUnchanged {
        record: String,
        value: String,
    },

    /// A cycle ended with an error
    CycleFailed {
        kind: &'static str,
        error: String,
        consecutive_errors: u64,
    },

    /// A cycle took at least one full interval
    CycleOverrun {
        elapsed: Duration,
        interval: Duration,
    },

    /// Periodic counter report
    Heartbeat(StatsSnapshot),

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`]
/// 3. A single-shot engine returns after one pass; a periodic engine runs
///    until a shutdown signal or a fatal error
///
/// ## Load Resistance
///
/// - **Bounded event channel**: a slow consumer loses events, never memory
/// - **Bounded operations**: every network call has a deadline
/// - **No catch-up**: an overrunning cycle delays the next one, it never
///   queues extra cycles
pub struct DdnsEngine {
    /// IP source for the desired value
    ip_source: Arc<dyn IpSource>,

    /// DNS provider holding the record
    provider: Arc<dyn DnsProvider>,

    /// The record to manage
    record: RecordConfig,

    /// Cadence and deadlines
    settings: EngineConfig,

    /// Shared counters
    stats: Arc<RuntimeStats>,

    /// Runs every network call under a deadline
    executor: BoundedExecutor,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine with its own counters
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        ip_source: Arc<dyn IpSource>,
        provider: Arc<dyn DnsProvider>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        Self::with_stats(ip_source, provider, config, Arc::new(RuntimeStats::new()))
    }

    /// Create a new DDNS engine reporting into `stats`
    pub fn with_stats(
        ip_source: Arc<dyn IpSource>,
        provider: Arc<dyn DnsProvider>,
        config: DdnsConfig,
        stats: Arc<RuntimeStats>,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        // Provider and source settings were checked by their factories
        config.record.validate()?;
        config.engine.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            ip_source,
            provider,
            record: config.record,
            settings: config.engine,
            executor: BoundedExecutor::new(stats.clone()),
            stats,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<RuntimeStats> {
        self.stats.clone()
    }

    /// One reconciliation pass without bookkeeping
    ///
    /// Address fetch, record lookup, reconcile and apply run strictly in that
    /// order. Placeholder credentials fail before any network call.
    pub async fn run_pass(&self) -> Result<ApplyOutcome> {
        self.provider.check_credentials()?;

        let deadline = self.settings.operation_timeout();

        let source = self.ip_source.clone();
        let value = self
            .executor
            .execute("fetch address", deadline, async move { source.current().await })
            .await?;
        debug!(source = self.ip_source.source_name(), "Public address: {}", value);

        let desired = DesiredState::from_record(&self.record, value);

        let provider = self.provider.clone();
        let query = desired.query();
        let observed = self
            .executor
            .execute("list record", deadline, async move {
                provider.list_record(&query).await
            })
            .await?;

        let decision = reconcile::reconcile(&desired, observed.as_ref());
        let outcome =
            reconcile::apply(decision, self.provider.clone(), &self.executor, deadline).await?;

        let record = self.record.fqdn();
        match &outcome {
            ApplyOutcome::Unchanged => {
                info!("{} already points at {}", record, desired.value);
                self.emit_event(EngineEvent::RecordUnchanged {
                    record,
                    value: desired.value,
                });
            }
            ApplyOutcome::Created => {
                info!("Created {} -> {} (ttl {})", record, desired.value, desired.ttl);
                self.emit_event(EngineEvent::RecordCreated {
                    record,
                    value: desired.value,
                });
            }
            ApplyOutcome::Updated { reason } => {
                info!("Updated {} -> {} ({})", record, desired.value, reason);
                self.emit_event(EngineEvent::RecordUpdated {
                    record,
                    value: desired.value,
                    reason: *reason,
                });
            }
        }

        Ok(outcome)
    }

    /// One pass with counters, logging and events
    ///
    /// # Returns
    ///
    /// - `Ok(outcome)`: the pass succeeded
    /// - `Err(Error)`: the pass failed; [`Error::is_fatal`] says whether the
    ///   caller should stop
    pub async fn run_once(&self) -> Result<ApplyOutcome> {
        self.stats.record_cycle_start();
        let cycle = self.stats.snapshot().cycles;
        self.emit_event(EngineEvent::CycleStarted { cycle });

        match self.run_pass().await {
            Ok(outcome) => {
                self.stats.record_success();
                Ok(outcome)
            }
            Err(e) if e.is_fatal() => {
                error!(kind = e.kind(), "Fatal error in cycle {}: {}", cycle, e);
                self.emit_event(EngineEvent::CycleFailed {
                    kind: e.kind(),
                    error: e.to_string(),
                    consecutive_errors: self.stats.snapshot().consecutive_errors,
                });
                Err(e)
            }
            Err(e) => {
                let streak = self.stats.record_failure();
                error!(
                    kind = e.kind(),
                    consecutive_errors = streak,
                    "Cycle {} failed: {}",
                    cycle,
                    e
                );
                self.emit_event(EngineEvent::CycleFailed {
                    kind: e.kind(),
                    error: e.to_string(),
                    consecutive_errors: streak,
                });
                Err(e)
            }
        }
    }

    /// Run the engine
    ///
    /// Single-shot configurations return after one pass; periodic ones run
    /// until Ctrl-C or a fatal error.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown (or a successful single pass)
    /// - `Err(Error)`: Fatal error, or the failure of a single pass
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until `shutdown_rx` fires or its sender is dropped
    ///
    /// `None` waits for Ctrl-C, as [`DdnsEngine::run()`] does.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let single_shot = self.settings.is_single_shot();
        info!(
            provider = self.provider.provider_name(),
            single_shot,
            "Managing {} ({})",
            self.record.fqdn(),
            self.record.record_type
        );
        self.emit_event(EngineEvent::Started {
            record: self.record.fqdn(),
            single_shot,
        });

        if single_shot {
            let result = self.run_once().await.map(|_| ());
            self.stop("single pass complete");
            return result;
        }

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let interval = self.settings.interval();
        let heartbeat = self.settings.heartbeat();
        let mut next_heartbeat = (!heartbeat.is_zero()).then(|| Instant::now() + heartbeat);

        // Cycles start on `start + n * interval`; only an overrun re-anchors
        let mut slot = Instant::now();

        let result = 'cycles: loop {
            let cycle_start = Instant::now();

            let pass = tokio::select! {
                pass = self.run_once() => pass,
                _ = &mut shutdown => break 'cycles Ok(()),
            };
            if let Err(e) = pass {
                if e.is_fatal() {
                    break 'cycles Err(e);
                }
            }

            let now = Instant::now();
            let (next_start, overran) = next_slot(slot, now, interval);
            slot = next_start;
            if overran {
                let elapsed = now - cycle_start;
                warn!(
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    interval_secs = interval.as_secs(),
                    "Cycle overran its interval; starting the next one immediately"
                );
                self.emit_event(EngineEvent::CycleOverrun { elapsed, interval });
            }

            loop {
                let beat_at = next_heartbeat.unwrap_or(next_start);
                tokio::select! {
                    _ = &mut shutdown => break 'cycles Ok(()),
                    _ = sleep_until(next_start) => break,
                    _ = sleep_until(beat_at), if next_heartbeat.is_some() => {
                        self.heartbeat();
                        next_heartbeat = Some(Instant::now() + heartbeat);
                    }
                }
            }
        };

        let reason = match &result {
            Ok(()) => "shutdown signal".to_string(),
            Err(e) => format!("fatal error: {}", e),
        };
        self.stop(&reason);
        result
    }

    fn heartbeat(&self) {
        let snapshot = self.stats.snapshot();
        info!(
            cycles = snapshot.cycles,
            successes = snapshot.successes,
            errors = snapshot.errors,
            consecutive_errors = snapshot.consecutive_errors,
            active_operations = snapshot.active_operations,
            last_success = ?snapshot.last_success,
            "Heartbeat"
        );
        self.emit_event(EngineEvent::Heartbeat(snapshot));
    }

    fn stop(&self, reason: &str) {
        self.executor.cancel_all();
        info!("Engine stopped: {}", reason);
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // A full channel means the consumer is behind; drop rather than grow
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Start of the cycle following the one scheduled at `slot`, judged at `now`
///
/// Returns the new slot and whether the previous cycle overran. A late timer
/// wake-up does not move the schedule.
fn next_slot(slot: Instant, now: Instant, interval: Duration) -> (Instant, bool) {
    let next = slot + interval;
    if now >= next { (now, true) } else { (next, false) }
}

impl std::fmt::Debug for DdnsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdnsEngine")
            .field("provider", &self.provider.provider_name())
            .field("source", &self.ip_source.source_name())
            .field("record", &self.record.fqdn())
            .field("settings", &self.settings)
            .finish()
    }
}
