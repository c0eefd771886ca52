// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::sync::Arc;
use stockroom_ingest::{SheetsClient, SourceError};
use stockroom_model::{Item, Transaction};
use tracing::info;

pub const HISTORY_HEADER: [&str; 7] = [
    "Data/Hora",
    "Tipo",
    "Item",
    "Quantidade",
    "Usuário",
    "Saldo Após",
    "Observações",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorError(pub String);

impl std::fmt::Display for MirrorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MirrorError {}

impl From<SourceError> for MirrorError {
    fn from(value: SourceError) -> Self {
        Self(value.to_string())
    }
}

/// Best-effort copy of ledger activity back into the external spreadsheet.
#[async_trait]
pub trait HistoryMirror: Send + Sync + 'static {
    fn is_configured(&self) -> bool;

    async fn append_history(&self, tx: &Transaction) -> Result<(), MirrorError>;

    /// Balance write-back is optional for mirrors.
    async fn mirror_balance(&self, _item: &Item) -> Result<(), MirrorError> {
        Ok(())
    }
}

#[must_use]
pub fn history_row(tx: &Transaction) -> Vec<String> {
    vec![
        tx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        tx.kind.label().to_string(),
        tx.item_name.clone(),
        tx.quantity.to_string(),
        tx.actor.clone(),
        tx.balance_after.to_string(),
        String::new(),
    ]
}

/// Mirror that does nothing; used when no spreadsheet is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMirror;

#[async_trait]
impl HistoryMirror for DisabledMirror {
    fn is_configured(&self) -> bool {
        false
    }

    async fn append_history(&self, _tx: &Transaction) -> Result<(), MirrorError> {
        Err(MirrorError("history mirror not configured".to_string()))
    }
}

pub struct SheetsHistoryMirror {
    client: Arc<SheetsClient>,
    section: String,
}

impl SheetsHistoryMirror {
    #[must_use]
    pub fn new(client: Arc<SheetsClient>, section: &str) -> Self {
        Self {
            client,
            section: section.to_string(),
        }
    }
}

#[async_trait]
impl HistoryMirror for SheetsHistoryMirror {
    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn append_history(&self, tx: &Transaction) -> Result<(), MirrorError> {
        let row = history_row(tx);
        match self.client.append_row(&self.section, &row).await {
            Ok(()) => Ok(()),
            Err(SourceError::SectionMissing(_)) => {
                info!(section = %self.section, "creating history section");
                self.client.add_section(&self.section).await?;
                let header: Vec<String> = HISTORY_HEADER.iter().map(ToString::to_string).collect();
                self.client.append_row(&self.section, &header).await?;
                self.client.append_row(&self.section, &row).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
