//! Record reconciliation
//!
//! [`reconcile`] compares the desired record with what the provider holds and
//! picks the single corrective action; [`apply`] carries it out. A pass issues
//! at most one mutating call, and a [`ReconcileDecision::NoOp`] never reaches
//! the network.
//!
//! Values are compared byte for byte. `"1.2.3.4"` and `"001.2.3.4"` are
//! different records as far as the reconciler is concerned.

use crate::config::RecordConfig;
use crate::error::Result;
use crate::executor::BoundedExecutor;
use crate::traits::DnsProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The record as it should be, recomputed every cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    /// Zone at the provider
    pub domain: String,
    /// Host label inside the zone
    pub subdomain: String,
    /// Record type ("A")
    pub record_type: String,
    /// Observed public address
    pub value: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Provider routing tag
    pub line: String,
}

impl DesiredState {
    /// Combine the configured record with the address observed this cycle
    pub fn from_record(record: &RecordConfig, value: impl Into<String>) -> Self {
        Self {
            domain: record.domain.clone(),
            subdomain: record.subdomain.clone(),
            record_type: record.record_type.clone(),
            value: value.into(),
            ttl: record.ttl,
            line: record.line.clone(),
        }
    }

    /// The lookup key for this record
    pub fn query(&self) -> RecordQuery {
        RecordQuery {
            domain: self.domain.clone(),
            subdomain: self.subdomain.clone(),
            record_type: self.record_type.clone(),
        }
    }
}

/// Identifies a record at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Zone at the provider
    pub domain: String,
    /// Host label inside the zone
    pub subdomain: String,
    /// Record type
    pub record_type: String,
}

/// The record as the provider currently holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    /// Opaque provider identifier
    pub id: String,
    /// Current record value
    pub value: String,
    /// Current time-to-live
    pub ttl: u32,
}

/// Which fields made an update necessary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffReason {
    /// Only the value differs
    ValueChanged,
    /// Only the TTL differs
    TtlChanged,
    /// Both differ
    ValueAndTtlChanged,
}

impl fmt::Display for DiffReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffReason::ValueChanged => "value changed",
            DiffReason::TtlChanged => "ttl changed",
            DiffReason::ValueAndTtlChanged => "value+ttl changed",
        })
    }
}

/// The single action chosen for a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// Record already matches
    NoOp,
    /// No record exists yet
    Create(DesiredState),
    /// Record exists but differs
    Update {
        /// Provider id of the existing record
        id: String,
        /// Values to write
        desired: DesiredState,
        /// Fields that differ
        reason: DiffReason,
    },
}

impl ReconcileDecision {
    /// Whether carrying out this decision calls the provider
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ReconcileDecision::NoOp)
    }
}

/// Decide how to bring `observed` in line with `desired`
pub fn reconcile(desired: &DesiredState, observed: Option<&RemoteRecord>) -> ReconcileDecision {
    let Some(observed) = observed else {
        return ReconcileDecision::Create(desired.clone());
    };

    let value_changed = observed.value != desired.value;
    let ttl_changed = observed.ttl != desired.ttl;

    let reason = match (value_changed, ttl_changed) {
        (false, false) => return ReconcileDecision::NoOp,
        (true, false) => DiffReason::ValueChanged,
        (false, true) => DiffReason::TtlChanged,
        (true, true) => DiffReason::ValueAndTtlChanged,
    };

    ReconcileDecision::Update {
        id: observed.id.clone(),
        desired: desired.clone(),
        reason,
    }
}

/// What applying a decision did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Nothing was sent
    Unchanged,
    /// The record was created
    Created,
    /// The record was modified
    Updated {
        /// Fields that differed
        reason: DiffReason,
    },
}

/// Carry out `decision` with at most one bounded provider call
pub async fn apply(
    decision: ReconcileDecision,
    provider: Arc<dyn DnsProvider>,
    executor: &BoundedExecutor,
    deadline: Duration,
) -> Result<ApplyOutcome> {
    match decision {
        ReconcileDecision::NoOp => Ok(ApplyOutcome::Unchanged),
        ReconcileDecision::Create(desired) => {
            executor
                .execute("create record", deadline, async move {
                    provider.create_record(&desired).await
                })
                .await?;
            Ok(ApplyOutcome::Created)
        }
        ReconcileDecision::Update { id, desired, reason } => {
            executor
                .execute("modify record", deadline, async move {
                    provider.modify_record(&id, &desired).await
                })
                .await?;
            Ok(ApplyOutcome::Updated { reason })
        }
    }
}
