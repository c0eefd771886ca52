// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use stockroom_ingest::{ReconcileError, ReconcileReport, Reconciler, RecordSource};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Serializes reconciliation passes triggered by the timer and by callers.
pub struct SyncService {
    reconciler: Arc<Reconciler>,
    source: Arc<dyn RecordSource>,
    lock: Mutex<()>,
}

impl SyncService {
    #[must_use]
    pub fn new(reconciler: Arc<Reconciler>, source: Arc<dyn RecordSource>) -> Self {
        Self {
            reconciler,
            source,
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn source_tag(&self) -> &'static str {
        self.source.source_tag()
    }

    pub async fn run(&self, full: bool) -> Result<ReconcileReport, ReconcileError> {
        let _guard = self.lock.lock().await;
        if full {
            self.reconciler.run_full(self.source.as_ref()).await
        } else {
            self.reconciler.run(self.source.as_ref()).await
        }
    }
}

/// Periodic reconciliation; a zero interval disables it.
pub fn spawn_sync_task(sync: Arc<SyncService>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        info!("periodic sync disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match sync.run(false).await {
                Ok(report) => info!(
                    records_read = report.summary.records_read,
                    items_created = report.summary.items_created,
                    items_updated = report.summary.items_updated,
                    "periodic sync finished"
                ),
                Err(err) => error!(error = %err, "periodic sync failed"),
            }
        }
    }))
}
