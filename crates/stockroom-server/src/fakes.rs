// SPDX-License-Identifier: Apache-2.0

use crate::services::{ChatNotifier, HistoryMirror, MirrorError, NotifierError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use stockroom_model::Transaction;
use tokio::sync::Mutex;

/// In-process chat notifier used by tests and offline runs.
pub struct FakeNotifier {
    pub configured: bool,
    pub users: BTreeMap<String, String>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub lookups: AtomicU64,
    pub fail_send: AtomicBool,
    pub send_delay: Option<Duration>,
}

impl Default for FakeNotifier {
    fn default() -> Self {
        Self {
            configured: true,
            users: BTreeMap::new(),
            sent: Mutex::new(Vec::new()),
            lookups: AtomicU64::new(0),
            fail_send: AtomicBool::new(false),
            send_delay: None,
        }
    }
}

impl FakeNotifier {
    #[must_use]
    pub fn with_user(mut self, display_name: &str, id: &str) -> Self {
        self.users
            .insert(display_name.to_lowercase(), id.to_string());
        self
    }

    pub async fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatNotifier for FakeNotifier {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<String>, NotifierError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let wanted = name.trim().to_lowercase();
        Ok(self
            .users
            .iter()
            .find(|(display, _)| display.contains(&wanted))
            .map(|(_, id)| id.clone()))
    }

    async fn send_message(&self, channel: &str, text: &str) -> Result<(), NotifierError> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_send.load(Ordering::Relaxed) {
            return Err(NotifierError::SendFailed("channel_not_found".to_string()));
        }
        self.sent
            .lock()
            .await
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMirror {
    pub rows: Mutex<Vec<Transaction>>,
    pub fail: AtomicBool,
}

impl FakeMirror {
    pub async fn recorded(&self) -> Vec<Transaction> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl HistoryMirror for FakeMirror {
    fn is_configured(&self) -> bool {
        true
    }

    async fn append_history(&self, tx: &Transaction) -> Result<(), MirrorError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(MirrorError("spreadsheet quota exceeded".to_string()));
        }
        self.rows.lock().await.push(tx.clone());
        Ok(())
    }
}
