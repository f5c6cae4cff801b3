//! Periodic change detection.
//!
//! One background task owns the [`ChangeDetector`] and runs a cycle per tick.
//! Cycles never overlap: the next tick is only awaited once the previous
//! cycle has finished, and ticks missed meanwhile are skipped. Each delta is
//! published through a watch channel so readers swap in a whole result at once.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::detector::ChangeDetector;
use crate::models::ListingRecord;

pub type NewListings = Arc<Vec<ListingRecord>>;

pub struct PollingScheduler;

impl PollingScheduler {
    /// Run `detector` every `period`, starting one period from now
    pub fn start(detector: ChangeDetector, period: Duration) -> anyhow::Result<SchedulerHandle> {
        if period.is_zero() {
            anyhow::bail!("listing check period must be greater than zero");
        }

        let (tx, rx) = watch::channel(NewListings::default());
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let task = tokio::spawn(run(detector, period, tx, cancel_rx));
        info!("Listing check scheduled every {:?}", period);

        Ok(SchedulerHandle {
            latest: rx,
            cancel: Some(cancel_tx),
            task,
        })
    }
}

async fn run(
    mut detector: ChangeDetector,
    period: Duration,
    tx: watch::Sender<NewListings>,
    mut cancel: oneshot::Receiver<()>,
) -> ChangeDetector {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut cancel => break,
            _ = ticker.tick() => {}
        }

        // not raced against cancellation: a started cycle always completes
        match detector.detect_new_listings().await {
            Ok(new_listings) => {
                if !new_listings.is_empty() {
                    info!("🆕 {} new listings", new_listings.len());
                }
                tx.send_replace(Arc::new(new_listings));
            }
            Err(e) => error!("Listing check failed: {}", e),
        }
    }

    info!("Listing checks stopped");
    detector
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    latest: watch::Receiver<NewListings>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<ChangeDetector>,
}

impl SchedulerHandle {
    /// Delta produced by the most recent completed cycle
    pub fn latest_new_listings(&self) -> NewListings {
        self.latest.borrow().clone()
    }

    /// Receiver that sees every published delta
    pub fn subscribe(&self) -> watch::Receiver<NewListings> {
        self.latest.clone()
    }

    /// Stop scheduling further cycles; a cycle in flight still finishes
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Cancel and wait for the task, returning the detector with its retained state
    pub async fn join(mut self) -> anyhow::Result<ChangeDetector> {
        self.cancel();
        Ok(self.task.await?)
    }
}
