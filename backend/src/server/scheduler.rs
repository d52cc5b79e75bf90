//! Periodic synchronisation driver.
//!
//! Runs one pass immediately on startup, then one per interval. Overlap with
//! a manual trigger is harmless: the orchestrator coalesces the later pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::domain::ports::{LocalStore, RemoteStore};
use crate::domain::sync::{RunOutcome, SyncOrchestrator};

/// Drive scheduled passes until the shutdown channel flips to `true` or its
/// sender is dropped.
pub async fn run<L, R>(
    orchestrator: Arc<SyncOrchestrator<L, R>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    L: LocalStore,
    R: RemoteStore,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_pass(orchestrator.as_ref()).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("sync scheduler stopped");
}

async fn run_pass<L, R>(orchestrator: &SyncOrchestrator<L, R>)
where
    L: LocalStore,
    R: RemoteStore,
{
    match orchestrator.run().await {
        Ok(RunOutcome::Completed(summary)) => {
            if summary.is_noop() {
                info!(mode = ?summary.mode, "scheduled pass found stores in agreement");
            } else {
                info!(
                    mode = ?summary.mode,
                    written = summary.total_mutations(),
                    failed = summary.total_failed(),
                    "scheduled pass completed"
                );
            }
        }
        Ok(RunOutcome::Aborted { reason, .. }) => {
            info!(%reason, "scheduled pass aborted");
        }
        Ok(RunOutcome::Coalesced) => {
            warn!("scheduled pass overlapped a running pass; trigger dropped");
        }
        Err(err) => {
            error!(error = %err, "scheduled pass failed");
        }
    }
}

#[cfg(test)]
mod tests {
    //! Scheduler loop behaviour with a paused clock.

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::model::Transaction;
    use crate::domain::sync::SyncConfig;
    use crate::test_support::{InMemoryLocalStore, InMemoryRemoteStore};

    #[tokio::test(start_paused = true)]
    async fn first_pass_fires_immediately_and_shutdown_stops_the_loop() {
        let local = Arc::new(InMemoryLocalStore::new());
        local.seed_transaction(Transaction {
            id: "TRX-11111111".into(),
            total_amount: Some(12.5),
            created_at: Utc
                .with_ymd_and_hms(2026, 8, 20, 12, 0, 0)
                .single()
                .expect("valid date"),
            is_complete: true,
            order_type: "takeaway".into(),
            payment_method: "cash".into(),
        });
        let remote = Arc::new(InMemoryRemoteStore::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            local,
            Arc::clone(&remote),
            SyncConfig::default(),
        ));

        let (stop, stop_rx) = watch::channel(false);
        let scheduler = tokio::spawn(run(orchestrator, Duration::from_secs(30), stop_rx));

        // Let the immediate first tick run a pass.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.transaction_count(), 1);

        stop.send(true).expect("scheduler should be listening");
        scheduler.await.expect("scheduler task should join");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_sender_also_stops_the_loop() {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryRemoteStore::new()),
            SyncConfig::default(),
        ));

        let (stop, stop_rx) = watch::channel(false);
        let scheduler = tokio::spawn(run(orchestrator, Duration::from_secs(30), stop_rx));
        tokio::time::sleep(Duration::from_secs(1)).await;

        drop(stop);
        scheduler.await.expect("scheduler task should join");
    }
}
