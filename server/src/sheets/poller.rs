//! Background poll loop and manual sync.
//!
//! A cycle probes the sheet's row count and only fetches and merges when the
//! sheet grew, when this is the first cycle, or when the caller forces it.
//! One cycle runs at a time: the loop awaits a full cycle before sleeping,
//! and manual requests that arrive mid-cycle are answered with
//! [`CycleOutcome::Busy`] instead of queueing.

use custody_engine::{Importer, MergeReport, RecordStore, Timestamp};
use rand::Rng;
use serde::Serialize;
use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};
use tokio::sync::{watch, Mutex};

use super::{SheetClient, SheetError};
use crate::websocket::{ConnectionManager, ServerMessage};

/// Longest delay between cycles after repeated failures.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Jitter applied to the base interval, as a fraction.
const JITTER: f64 = 0.1;

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CycleOutcome {
    /// The row count did not grow; nothing was fetched
    #[serde(rename_all = "camelCase")]
    Unchanged { row_count: u64 },
    /// Rows were fetched and merged
    #[serde(rename_all = "camelCase")]
    Merged { row_count: u64, report: MergeReport },
    /// Another cycle was already in flight
    Busy,
}

/// Observable poller state.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Background loop is scheduled
    pub auto_sync: bool,
    /// A cycle is running right now
    pub in_flight: bool,
    pub last_row_count: Option<u64>,
    pub last_success: Option<Timestamp>,
    pub last_error: Option<String>,
    pub last_report: Option<MergeReport>,
    pub consecutive_failures: u32,
    pub cycles: u64,
}

pub struct SyncController {
    client: SheetClient,
    store: Arc<Mutex<RecordStore>>,
    importer: Importer,
    notifier: Arc<ConnectionManager>,
    interval: Duration,
    cycle: Mutex<()>,
    status: StdMutex<SyncStatus>,
    stop: StdMutex<Option<watch::Sender<bool>>>,
}

impl SyncController {
    pub fn new(
        client: SheetClient,
        store: Arc<Mutex<RecordStore>>,
        importer: Importer,
        notifier: Arc<ConnectionManager>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            store,
            importer,
            notifier,
            interval,
            cycle: Mutex::new(()),
            status: StdMutex::new(SyncStatus::default()),
            stop: StdMutex::new(None),
        })
    }

    pub fn status(&self) -> SyncStatus {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Run one cycle now unless one is already running.
    pub async fn sync_now(&self, force: bool) -> Result<CycleOutcome, SheetError> {
        let Ok(_guard) = self.cycle.try_lock() else {
            tracing::debug!("sync requested while a cycle is in flight");
            return Ok(CycleOutcome::Busy);
        };

        self.update_status(|s| s.in_flight = true);
        let result = self.run_cycle(force).await;
        self.update_status(|s| {
            s.in_flight = false;
            s.cycles += 1;
            match &result {
                Ok(outcome) => {
                    s.consecutive_failures = 0;
                    s.last_error = None;
                    s.last_success = Some(crate::now_millis());
                    match outcome {
                        CycleOutcome::Unchanged { row_count } => {
                            s.last_row_count = Some(*row_count);
                        }
                        CycleOutcome::Merged { row_count, report } => {
                            s.last_row_count = Some(*row_count);
                            s.last_report = Some(*report);
                        }
                        CycleOutcome::Busy => {}
                    }
                }
                Err(e) => {
                    s.consecutive_failures += 1;
                    s.last_error = Some(e.to_string());
                }
            }
        });

        result
    }

    /// The row count is only recorded once the cycle succeeds, so a failed
    /// fetch is retried on the next cycle.
    async fn run_cycle(&self, force: bool) -> Result<CycleOutcome, SheetError> {
        let previous = self.status().last_row_count;
        let row_count = self.client.row_count().await?;

        let grew = previous.map_or(true, |before| row_count > before);
        if !force && !grew {
            tracing::trace!(row_count, "sheet unchanged");
            return Ok(CycleOutcome::Unchanged { row_count });
        }

        let rows = self.client.fetch_rows().await?;

        let report = {
            let mut store = self.store.lock().await;
            self.importer.merge(&mut store, &rows, crate::now_millis())
        };

        if report.changed() > 0 {
            self.notifier.broadcast_all(ServerMessage::Synced { report });
        }

        Ok(CycleOutcome::Merged { row_count, report })
    }

    /// Start the background loop. No-op if it is already running.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut slot) = self.stop.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }

        let (tx, rx) = watch::channel(false);
        *slot = Some(tx);
        drop(slot);

        self.update_status(|s| s.auto_sync = true);
        tracing::info!(interval = ?self.interval, "auto-sync started");
        tokio::spawn(Arc::clone(self).run(rx));
    }

    /// Stop scheduling cycles. A cycle already running completes.
    pub fn stop(&self) {
        let sender = self.stop.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            let _ = sender.send(true);
            self.update_status(|s| s.auto_sync = false);
            tracing::info!("auto-sync stopped");
        }
    }

    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }

            let delay = match self.sync_now(false).await {
                Ok(_) => jittered(self.interval),
                Err(e) => {
                    let failures = self.status().consecutive_failures;
                    let delay = backoff(self.interval, failures);
                    tracing::warn!(failures, retry_in = ?delay, "sync cycle failed: {}", e);
                    delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("poll loop exited");
    }

    fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        if let Ok(mut status) = self.status.lock() {
            f(&mut status);
        }
    }
}

/// `interval` plus or minus up to 10%.
fn jittered(interval: Duration) -> Duration {
    let spread = interval.as_secs_f64() * JITTER;
    let offset = rand::rng().random_range(-spread..=spread);
    Duration::from_secs_f64((interval.as_secs_f64() + offset).max(0.0))
}

/// `interval * 2^failures`, capped.
fn backoff(interval: Duration, failures: u32) -> Duration {
    let factor = 2u32.saturating_pow(failures.min(16));
    interval.saturating_mul(factor).min(MAX_BACKOFF)
}
