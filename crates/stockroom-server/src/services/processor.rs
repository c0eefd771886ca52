// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use stockroom_core::{ErrorCode, MachineError};
use stockroom_ingest::{lookup_chat_identity, RecordSource, DEFAULT_PEOPLE_SECTION};
use stockroom_model::{
    EffectStatus, Item, ItemId, MovementError, SideEffectReport, Transaction, TransactionKind,
    TransactionOutcome, TransactionRequest, ValidationError,
};
use stockroom_store::{LedgerStore, MovementCommit, MovementFailure, StoreError, StoreErrorCode};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::notifier::notification_text;
use super::{ChatNotifier, HistoryMirror, NotifierSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    NotFound(ItemId),
    InsufficientStock { available: i64 },
    InvalidQuantity { in_use: i64 },
    Validation(String),
    StorageInconsistency(ItemId),
    Store(StoreError),
}

impl TransactionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            Self::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::StorageInconsistency(_) => ErrorCode::StorageInconsistency,
            Self::Store(_) => ErrorCode::Internal,
        }
    }

    #[must_use]
    pub fn to_machine_error(&self) -> MachineError {
        let err = MachineError::from_code(self.code(), &self.to_string());
        match self {
            Self::NotFound(id) | Self::StorageInconsistency(id) => {
                err.with_detail("item_id", &id.to_string())
            }
            Self::InsufficientStock { available } => {
                err.with_detail("available", &available.to_string())
            }
            Self::InvalidQuantity { in_use } => err.with_detail("in_use", &in_use.to_string()),
            Self::Validation(_) | Self::Store(_) => err,
        }
    }
}

impl Display for TransactionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "item {id} not found"),
            Self::InsufficientStock { available } => {
                write!(f, "insufficient stock: only {available} available")
            }
            Self::InvalidQuantity { in_use } => {
                write!(f, "invalid quantity: only {in_use} currently in use")
            }
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::StorageInconsistency(id) => {
                write!(f, "ledger inconsistency while updating item {id}")
            }
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<ValidationError> for TransactionError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.0)
    }
}

impl From<MovementFailure> for TransactionError {
    fn from(value: MovementFailure) -> Self {
        match value {
            MovementFailure::NotFound(id) => Self::NotFound(id),
            MovementFailure::Rejected(MovementError::InsufficientStock { available }) => {
                Self::InsufficientStock { available }
            }
            MovementFailure::Rejected(MovementError::InvalidQuantity { in_use }) => {
                Self::InvalidQuantity { in_use }
            }
            MovementFailure::Inconsistent(id) => Self::StorageInconsistency(id),
            MovementFailure::Store(e) if e.code == StoreErrorCode::Validation => {
                Self::Validation(e.message)
            }
            MovementFailure::Store(e) => Self::Store(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub chat_channel: String,
    pub people_section: String,
    pub external_timeout: Duration,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            chat_channel: String::new(),
            people_section: DEFAULT_PEOPLE_SECTION.to_string(),
            external_timeout: Duration::from_millis(5000),
        }
    }
}

/// Applies check-out/check-in requests. The quantity change and its
/// transaction record commit together; everything after that is best-effort
/// and never turns a committed movement into an error.
pub struct TransactionProcessor {
    store: Arc<LedgerStore>,
    notifier: Arc<dyn ChatNotifier>,
    mirror: Arc<dyn HistoryMirror>,
    settings: Arc<NotifierSettings>,
    people: Option<Arc<dyn RecordSource>>,
    options: ProcessorOptions,
}

impl TransactionProcessor {
    #[must_use]
    pub fn new(
        store: Arc<LedgerStore>,
        notifier: Arc<dyn ChatNotifier>,
        mirror: Arc<dyn HistoryMirror>,
        settings: Arc<NotifierSettings>,
        options: ProcessorOptions,
    ) -> Self {
        Self {
            store,
            notifier,
            mirror,
            settings,
            people: None,
            options,
        }
    }

    #[must_use]
    pub fn with_people_source(mut self, people: Arc<dyn RecordSource>) -> Self {
        self.people = Some(people);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn ChatNotifier> {
        &self.notifier
    }

    /// A notification can only go out with both a usable notifier and a channel.
    #[must_use]
    pub fn notifier_configured(&self) -> bool {
        self.notifier.is_configured() && !self.options.chat_channel.trim().is_empty()
    }

    pub async fn process(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionOutcome, TransactionError> {
        let actor = request.validate()?;
        let kind = request.kind;
        let item_id = request.item_id;
        let quantity = request.quantity;

        let store = Arc::clone(&self.store);
        let movement_actor = actor.clone();
        let commit = tokio::task::spawn_blocking(move || {
            store.apply_movement(kind, item_id, quantity, &movement_actor)
        })
        .await
        .map_err(|e| {
            TransactionError::Store(StoreError::new(
                StoreErrorCode::Internal,
                format!("movement task failed: {e}"),
            ))
        })?
        .map_err(|failure| {
            if let MovementFailure::Inconsistent(id) = &failure {
                error!(item_id = id, kind = %kind, "movement rolled back after inconsistent update");
            }
            TransactionError::from(failure)
        })?;

        let MovementCommit { item, transaction } = commit;
        info!(
            transaction_id = transaction.id,
            item_id = item.id,
            kind = %kind,
            quantity,
            balance_after = transaction.balance_after,
            "transaction committed"
        );

        let usage_records = self.update_usage_records(&item, &transaction).await;
        let ((notification, chat_identity), mirror) = tokio::join!(
            self.notify(&transaction),
            self.mirror_history(&item, &transaction)
        );

        let notified = notification.is_applied();
        Ok(TransactionOutcome {
            success: true,
            message: format!(
                "{} of {} x {} recorded",
                kind.label(),
                quantity,
                transaction.item_name
            ),
            transaction_id: transaction.id,
            new_balance: transaction.balance_after,
            notified,
            side_effects: SideEffectReport {
                usage_records,
                chat_identity,
                notification,
                mirror,
            },
        })
    }

    async fn update_usage_records(&self, item: &Item, tx: &Transaction) -> usize {
        let store = Arc::clone(&self.store);
        let transaction_id = tx.id;
        let item = item.clone();
        let tx = tx.clone();
        let result = tokio::task::spawn_blocking(move || match tx.kind {
            TransactionKind::CheckOut => open_usage_records(&store, &item, &tx),
            TransactionKind::CheckIn => {
                let count = usize::try_from(tx.quantity).unwrap_or(0);
                store.remove_usage_records(tx.item_id, &tx.actor, count)
            }
        })
        .await;
        match result {
            Ok(Ok(count)) => count,
            Ok(Err(err)) => {
                warn!(transaction_id, error = %err, "usage record update failed");
                0
            }
            Err(err) => {
                warn!(error = %err, "usage record task failed");
                0
            }
        }
    }

    async fn notify(&self, tx: &Transaction) -> (EffectStatus, Option<String>) {
        if !self.settings.is_enabled().await {
            debug!(transaction_id = tx.id, "chat notification disabled");
            return (EffectStatus::Skipped, None);
        }
        if !self.notifier_configured() {
            warn!(transaction_id = tx.id, "chat notifier enabled but not configured");
            return (
                EffectStatus::Failed("notifier not configured".to_string()),
                None,
            );
        }
        let identity = self.resolve_chat_identity(&tx.actor).await;
        let text = notification_text(tx, identity.as_deref());
        let status = match timeout(
            self.options.external_timeout,
            self.notifier.send_message(&self.options.chat_channel, &text),
        )
        .await
        {
            Ok(Ok(())) => {
                info!(transaction_id = tx.id, channel = %self.options.chat_channel, "chat notification sent");
                EffectStatus::Applied
            }
            Ok(Err(err)) => {
                warn!(transaction_id = tx.id, error = %err, "chat notification failed");
                EffectStatus::Failed(err.to_string())
            }
            Err(_) => {
                warn!(transaction_id = tx.id, "chat notification timed out");
                EffectStatus::Failed("chat notification timed out".to_string())
            }
        };
        (status, identity)
    }

    /// People section first, then the chat directory. Any failure means no id.
    async fn resolve_chat_identity(&self, actor: &str) -> Option<String> {
        let limit = self.options.external_timeout;
        if let Some(people) = &self.people {
            match timeout(
                limit,
                lookup_chat_identity(people.as_ref(), &self.options.people_section, actor),
            )
            .await
            {
                Ok(Ok(Some(id))) => return Some(id),
                Ok(Ok(None)) => {}
                Ok(Err(err)) => warn!(error = %err, "people lookup failed"),
                Err(_) => warn!("people lookup timed out"),
            }
        }
        match timeout(limit, self.notifier.find_user_by_name(actor)).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!(error = %err, "chat directory lookup failed");
                None
            }
            Err(_) => {
                warn!("chat directory lookup timed out");
                None
            }
        }
    }

    async fn mirror_history(&self, item: &Item, tx: &Transaction) -> EffectStatus {
        if !self.mirror.is_configured() {
            return EffectStatus::Skipped;
        }
        let work = async {
            match self.mirror.mirror_balance(item).await {
                Ok(()) => self.mirror.append_history(tx).await,
                Err(err) => Err(err),
            }
        };
        match timeout(self.options.external_timeout, work).await {
            Ok(Ok(())) => EffectStatus::Applied,
            Ok(Err(err)) => {
                warn!(transaction_id = tx.id, error = %err, "history mirror failed");
                EffectStatus::Failed(err.to_string())
            }
            Err(_) => {
                warn!(transaction_id = tx.id, "history mirror timed out");
                EffectStatus::Failed("history mirror timed out".to_string())
            }
        }
    }
}

/// One record per unit, taking the item's codes in order and skipping codes
/// already on loan.
fn open_usage_records(
    store: &LedgerStore,
    item: &Item,
    tx: &Transaction,
) -> Result<usize, StoreError> {
    let wanted = usize::try_from(tx.quantity).unwrap_or(0);
    let assigned =
        store.assign_usage_codes(item.id, &item.codes, &tx.actor, wanted, tx.timestamp)?;
    Ok(assigned.len())
}
