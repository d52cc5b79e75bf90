//! Bidirectional synchronisation between the local and remote stores.
//!
//! One [`SyncOrchestrator::run`] call is a *pass*: mode detection, then
//! entity-by-entity reconciliation in dependency order. Passes are
//! non-reentrant; a trigger arriving while a pass is running is coalesced
//! (dropped, not queued) since the in-flight pass observes the same end
//! state. Row-level failures never abort a pass; only a connectivity
//! failure before any remote row has been reconciled does.

pub mod mapper;
mod pull;
mod push;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::model::{ENTITY_SYNC_ORDER, EntityKind};
use crate::domain::ports::{LocalStore, RemoteStore, StoreError};

pub use mapper::MappingError;

/// Direction of one pass, decided from the local store's bootstrap state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Bootstrap: local store is empty, hydrate it from the remote.
    Pull,
    /// Steady state: propagate local rows and deletions to the remote.
    Push,
}

/// Row-operation counters for one entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    /// Rows written locally during a pull.
    pub pulled: u32,
    /// Rows written remotely during a push.
    pub pushed: u32,
    /// Remote rows removed during deletion reconciliation.
    pub deleted: u32,
    /// Rows whose content already matched; no write issued.
    pub unchanged: u32,
    /// Rows that failed and were recorded rather than retried.
    pub failed: u32,
}

/// Aggregate outcome of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    /// Direction the pass ran in.
    pub mode: SyncMode,
    /// Per-entity row counters.
    pub entities: BTreeMap<EntityKind, EntityCounts>,
    /// Collections skipped because their upstream query failed.
    pub skipped: Vec<EntityKind>,
}

impl SyncSummary {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            entities: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    fn counts_mut(&mut self, kind: EntityKind) -> &mut EntityCounts {
        self.entities.entry(kind).or_default()
    }

    fn mark_skipped(&mut self, kind: EntityKind) {
        if !self.skipped.contains(&kind) {
            self.skipped.push(kind);
        }
    }

    /// Total rows that failed across all entity types.
    pub fn total_failed(&self) -> u32 {
        self.entities.values().map(|c| c.failed).sum()
    }

    /// Total rows written or removed in either store.
    pub fn total_mutations(&self) -> u32 {
        self.entities
            .values()
            .map(|c| c.pulled + c.pushed + c.deleted)
            .sum()
    }

    /// True when the pass changed nothing and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.total_mutations() == 0 && self.total_failed() == 0 && self.skipped.is_empty()
    }
}

/// Why a pass ended before reconciling every entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Process shutdown was requested; the pass finished its current entity
    /// type and stopped.
    ShutdownRequested,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShutdownRequested => f.write_str("shutdown requested"),
        }
    }
}

/// Result of asking the orchestrator for a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The pass ran every entity type.
    Completed(SyncSummary),
    /// The pass stopped early; counters cover the types that did run.
    Aborted {
        /// Why the pass stopped.
        reason: AbortReason,
        /// Counters accumulated before the stop.
        partial: SyncSummary,
    },
    /// A pass was already running; this trigger was dropped.
    Coalesced,
}

/// Pass-level failure: the pass could not run at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Neither reconciliation direction could reach its stores.
    #[error("sync unavailable: {message}")]
    Unavailable {
        /// Underlying store failure.
        message: String,
    },
}

impl SyncError {
    fn unavailable(err: &StoreError) -> Self {
        Self::Unavailable {
            message: err.to_string(),
        }
    }
}

/// Tuning knobs for a pass.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on concurrently dispatched row writes within one entity
    /// type. Entity types themselves are strictly sequential.
    pub worker_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { worker_limit: 4 }
    }
}

/// Row-level failure recorded during a pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub(crate) enum RowError {
    /// A store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The row could not be translated between shapes.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl RowError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Store(StoreError::NotFound { .. }) => "not_found",
            Self::Store(StoreError::Conflict { .. }) => "conflict",
            Self::Store(StoreError::Unavailable { .. }) => "unavailable",
            Self::Store(StoreError::Query { .. }) => "query",
            Self::Mapping(_) => "mapping",
        }
    }
}

/// Outcome of reconciling a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowOutcome {
    /// A write was issued.
    Written,
    /// Content already matched; nothing written.
    Unchanged,
}

/// Drives one complete, resumable synchronisation pass over injected store
/// handles.
pub struct SyncOrchestrator<L, R> {
    local: Arc<L>,
    remote: Arc<R>,
    config: SyncConfig,
    running: AtomicBool,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<L, R> SyncOrchestrator<L, R> {
    /// Build an orchestrator over explicit store handles.
    pub fn new(local: Arc<L>, remote: Arc<R>, config: SyncConfig) -> Self {
        Self {
            local,
            remote,
            config,
            running: AtomicBool::new(false),
            shutdown: None,
        }
    }

    /// Observe a shutdown channel; a pass checks it between entity types
    /// and stops cleanly rather than leaving a type half-reconciled.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

impl<L, R> SyncOrchestrator<L, R>
where
    L: LocalStore,
    R: RemoteStore,
{
    /// Run one pass. Returns [`RunOutcome::Coalesced`] without doing any
    /// work when a pass is already in flight.
    pub async fn run(&self) -> Result<RunOutcome, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("sync pass already running, trigger coalesced");
            return Ok(RunOutcome::Coalesced);
        }

        let result = self.run_pass().await;
        self.running.store(false, Ordering::Release);
        result
    }

    async fn run_pass(&self) -> Result<RunOutcome, SyncError> {
        let mode = self.detect_mode().await?;
        info!(mode = ?mode, "sync pass starting");

        let mut summary = SyncSummary::new(mode);
        for (index, kind) in ENTITY_SYNC_ORDER.into_iter().enumerate() {
            if self.shutdown_requested() {
                warn!(entity = %kind, "sync pass stopping before next entity type");
                return Ok(RunOutcome::Aborted {
                    reason: AbortReason::ShutdownRequested,
                    partial: summary,
                });
            }

            let first_remote_contact = index == 0;
            match mode {
                SyncMode::Pull => {
                    self.pull_entity(kind, first_remote_contact, &mut summary)
                        .await?;
                }
                SyncMode::Push => {
                    self.push_entity(kind, first_remote_contact, &mut summary)
                        .await?;
                }
            }
        }

        info!(
            mode = ?mode,
            mutations = summary.total_mutations(),
            failed = summary.total_failed(),
            "sync pass completed"
        );
        Ok(RunOutcome::Completed(summary))
    }

    /// PULL bootstrap only when the local store has never recorded a
    /// transaction or a product.
    async fn detect_mode(&self) -> Result<SyncMode, SyncError> {
        let transactions = self
            .local
            .count_transactions()
            .await
            .map_err(|e| SyncError::unavailable(&e))?;
        let products = self
            .local
            .count_products()
            .await
            .map_err(|e| SyncError::unavailable(&e))?;

        Ok(if transactions == 0 && products == 0 {
            SyncMode::Pull
        } else {
            SyncMode::Push
        })
    }

    /// Decide what a failed remote collection query means for the pass.
    ///
    /// Connectivity loss before any remote row has been reconciled aborts
    /// the whole pass; anything later is logged and the collection skipped.
    fn collection_failure(
        &self,
        kind: EntityKind,
        first_remote_contact: bool,
        error: &StoreError,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        if first_remote_contact && error.is_unavailable() {
            return Err(SyncError::unavailable(error));
        }
        warn!(entity = %kind, error = %error, "collection query failed, skipping entity type");
        summary.mark_skipped(kind);
        Ok(())
    }

    fn record_row_failure(kind: EntityKind, id: &str, error: &RowError, summary: &mut SyncSummary) {
        warn!(entity = %kind, id = %id, kind = error.kind(), error = %error, "row reconciliation failed");
        summary.counts_mut(kind).failed += 1;
    }
}
