// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stockroom_core::{Clock, ErrorCode, SystemClock};
use stockroom_model::{ExternalRecord, ReconcileSummary};
use stockroom_store::{LedgerStore, StoreError, StoreErrorCode};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::plan::{group_records, plan_item_change, ItemChange, RecordGroup};
use crate::{ReconcileEvent, ReconcileLog, ReconcileStage, RecordSource, SourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    SourceUnavailable(String),
    Store(StoreError),
}

impl ReconcileError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::SourceUnavailable(_) => ErrorCode::ExternalSourceUnavailable,
            Self::Store(_) => ErrorCode::Internal,
        }
    }
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable(msg) => write!(f, "external source unavailable: {msg}"),
            Self::Store(e) => write!(f, "ledger store failed: {e}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub summary: ReconcileSummary,
    pub full_resync: bool,
    pub items_cleared: usize,
    pub events: Vec<ReconcileEvent>,
}

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

struct Fetched {
    records: Vec<ExternalRecord>,
    sections_read: Vec<String>,
    sections_missing: Vec<String>,
}

/// Merges external records into the ledger. Each item goes through the
/// store's per-key critical section, so a pass can overlap live transactions.
pub struct Reconciler {
    store: Arc<LedgerStore>,
    sections: Vec<String>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<LedgerStore>, sections: Vec<String>) -> Self {
        Self {
            store,
            sections,
            clock: Arc::new(SystemClock),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Bound on each source call; an expired call aborts the pass as unavailable.
    #[must_use]
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    #[instrument(name = "reconcile_pass", skip_all, fields(source = source.source_tag()))]
    pub async fn run(&self, source: &dyn RecordSource) -> Result<ReconcileReport, ReconcileError> {
        self.pass(source, false).await
    }

    /// Clears every item (transactions survive) and rebuilds from the source.
    /// The source is read before anything is cleared.
    #[instrument(name = "reconcile_full_pass", skip_all, fields(source = source.source_tag()))]
    pub async fn run_full(
        &self,
        source: &dyn RecordSource,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.pass(source, true).await
    }

    async fn pass(
        &self,
        source: &dyn RecordSource,
        full_resync: bool,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut log = ReconcileLog::default();
        info!(sections = self.sections.len(), full_resync, "reconcile pass started");
        let fetched = self.fetch(source, &mut log).await?;

        let records_read = fetched.records.len();
        let groups = group_records(fetched.records);
        let grouped: i64 = groups.iter().map(|g| g.total).sum();
        let rejected = i64::try_from(records_read).unwrap_or(i64::MAX) - grouped;
        log.emit(
            ReconcileStage::Group,
            "records_grouped",
            [
                ("records", records_read.to_string()),
                ("groups", groups.len().to_string()),
                ("rejected", rejected.to_string()),
            ],
        );
        if records_read == 0 {
            warn!(
                sections_missing = fetched.sections_missing.len(),
                "reconcile pass found no usable records"
            );
        }

        let store = Arc::clone(&self.store);
        let now = self.clock.now();
        let unique_items = groups.len();
        let merged = tokio::task::spawn_blocking(move || {
            let items_cleared = if full_resync { store.clear_all_items()? } else { 0 };
            merge_groups(&store, &groups, now, log).map(|m| (items_cleared, m))
        })
        .await
        .map_err(|e| {
            ReconcileError::Store(StoreError::new(
                StoreErrorCode::Internal,
                format!("reconcile merge task failed: {e}"),
            ))
        })??;
        let (items_cleared, (items_created, items_updated, mut log)) = merged;

        let summary = ReconcileSummary {
            records_read,
            unique_items,
            items_created,
            items_updated,
            sections_read: fetched.sections_read,
            sections_missing: fetched.sections_missing,
        };
        log.emit(
            ReconcileStage::Finalize,
            "pass_finished",
            [
                ("items_created", items_created.to_string()),
                ("items_updated", items_updated.to_string()),
                ("items_cleared", items_cleared.to_string()),
            ],
        );
        info!(
            records_read,
            unique_items,
            items_created,
            items_updated,
            items_cleared,
            "reconcile pass finished"
        );
        Ok(ReconcileReport {
            summary,
            full_resync,
            items_cleared,
            events: log.into_events(),
        })
    }

    async fn fetch(
        &self,
        source: &dyn RecordSource,
        log: &mut ReconcileLog,
    ) -> Result<Fetched, ReconcileError> {
        let listed = self
            .bounded("list sections", source.list_sections())
            .await
            .map_err(|e| ReconcileError::SourceUnavailable(e.to_string()))?;

        let mut fetched = Fetched {
            records: Vec::new(),
            sections_read: Vec::new(),
            sections_missing: Vec::new(),
        };
        for section in &self.sections {
            let rows = if listed.iter().any(|s| s == section) {
                self.bounded(section, source.read_section(section)).await
            } else {
                Err(SourceError::SectionMissing(section.clone()))
            };
            match rows {
                Ok(rows) => {
                    let before = fetched.records.len();
                    fetched
                        .records
                        .extend(rows.iter().filter_map(|row| ExternalRecord::from_row(row, section)));
                    let usable = fetched.records.len() - before;
                    log.emit(
                        ReconcileStage::Fetch,
                        "section_read",
                        [
                            ("section", section.clone()),
                            ("rows", rows.len().to_string()),
                            ("records", usable.to_string()),
                        ],
                    );
                    fetched.sections_read.push(section.clone());
                }
                Err(SourceError::SectionMissing(_)) => {
                    warn!(section = %section, "external section missing; skipped");
                    log.emit(
                        ReconcileStage::Fetch,
                        "section_missing",
                        [("section", section.clone())],
                    );
                    fetched.sections_missing.push(section.clone());
                }
                Err(SourceError::Unavailable(msg)) => {
                    return Err(ReconcileError::SourceUnavailable(msg));
                }
            }
        }
        Ok(fetched)
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        match timeout(self.fetch_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    call = what,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "source call timed out"
                );
                Err(SourceError::Unavailable(format!(
                    "{what} timed out after {}ms",
                    self.fetch_timeout.as_millis()
                )))
            }
        }
    }
}

fn merge_groups(
    store: &LedgerStore,
    groups: &[RecordGroup],
    now: DateTime<Utc>,
    mut log: ReconcileLog,
) -> Result<(usize, usize, ReconcileLog), ReconcileError> {
    let mut created = 0;
    let mut updated = 0;
    for group in groups {
        let change = store.merge_item(&group.key.name, &group.key.origin, |current| {
            let change = plan_item_change(current, group, now);
            (change.upsert().cloned(), change)
        })?;
        match &change {
            ItemChange::Create(_) => created += 1,
            ItemChange::Adjust {
                upsert,
                diff,
                shortfall,
            } => {
                if let Some(shortfall) = shortfall {
                    warn!(
                        item = %group.key,
                        shortfall,
                        in_use = upsert.in_use,
                        "reconcile decrease exceeds available stock; available clamped at zero"
                    );
                    log.emit(
                        ReconcileStage::Merge,
                        "available_clamped",
                        [
                            ("item", group.key.to_string()),
                            ("shortfall", shortfall.to_string()),
                        ],
                    );
                }
                log.emit(
                    ReconcileStage::Merge,
                    "total_adjusted",
                    [
                        ("item", group.key.to_string()),
                        ("diff", diff.to_string()),
                        ("total", upsert.total.to_string()),
                    ],
                );
            }
            ItemChange::Metadata { .. } | ItemChange::Unchanged => {}
        }
        if change.counts_as_updated() {
            updated += 1;
        }
    }
    Ok((created, updated, log))
}
