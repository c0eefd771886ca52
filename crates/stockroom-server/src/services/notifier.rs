// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use stockroom_core::ErrorCode;
use stockroom_model::{Transaction, TransactionKind};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierError {
    Unavailable(String),
    SendFailed(String),
}

impl NotifierError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) => ErrorCode::NotifierUnavailable,
            Self::SendFailed(_) => ErrorCode::NotifierSendFailed,
        }
    }
}

impl Display for NotifierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "{}: {msg}", self.code()),
            Self::SendFailed(msg) => write!(f, "{}: {msg}", self.code()),
        }
    }
}

impl std::error::Error for NotifierError {}

#[async_trait]
pub trait ChatNotifier: Send + Sync + 'static {
    fn is_configured(&self) -> bool;

    /// Case-insensitive substring match on real or display name.
    async fn find_user_by_name(&self, name: &str) -> Result<Option<String>, NotifierError>;

    async fn send_message(&self, channel: &str, text: &str) -> Result<(), NotifierError>;
}

/// Informational message body; not a stable format.
#[must_use]
pub fn notification_text(tx: &Transaction, chat_identity: Option<&str>) -> String {
    let who = chat_identity.map_or_else(|| tx.actor.clone(), |id| format!("<@{id}>"));
    let verb = match tx.kind {
        TransactionKind::CheckOut => "checked out",
        TransactionKind::CheckIn => "returned",
    };
    format!(
        "*{label}* | {item}\n{who} {verb} {qty} unit(s). Available now: {balance}",
        label = tx.kind.label(),
        item = tx.item_name,
        qty = tx.quantity,
        balance = tx.balance_after,
    )
}

#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    members: Vec<SlackMember>,
}

#[derive(Debug, Deserialize)]
struct SlackMember {
    id: String,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

impl SlackMember {
    fn matches(&self, wanted: &str) -> bool {
        let profile = self.profile.as_ref();
        [
            self.real_name.as_deref(),
            profile.and_then(|p| p.real_name.as_deref()),
            profile.and_then(|p| p.display_name.as_deref()),
        ]
        .into_iter()
        .flatten()
        .any(|candidate| candidate.to_lowercase().contains(wanted))
    }
}

/// Slack Web API notifier (`users.list`, `chat.postMessage`).
pub struct SlackNotifier {
    api_base: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl SlackNotifier {
    #[must_use]
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            http,
        }
    }

    fn auth_headers(&self) -> Result<HeaderMap, NotifierError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| NotifierError::Unavailable("bot token not configured".to_string()))?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| NotifierError::Unavailable(format!("invalid auth header: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

#[async_trait]
impl ChatNotifier for SlackNotifier {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    #[instrument(name = "slack_find_user", skip(self))]
    async fn find_user_by_name(&self, name: &str) -> Result<Option<String>, NotifierError> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        let resp = self
            .http
            .get(format!("{}/users.list", self.api_base))
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| NotifierError::Unavailable(format!("users.list failed: {e}")))?;
        let envelope: SlackEnvelope = resp
            .json()
            .await
            .map_err(|e| NotifierError::Unavailable(format!("users.list body: {e}")))?;
        if !envelope.ok {
            return Err(NotifierError::Unavailable(
                envelope.error.unwrap_or_else(|| "users.list rejected".to_string()),
            ));
        }
        Ok(envelope
            .members
            .iter()
            .filter(|m| !m.deleted && !m.is_bot)
            .find(|m| m.matches(&wanted))
            .map(|m| m.id.clone()))
    }

    #[instrument(name = "slack_post_message", skip(self, text))]
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), NotifierError> {
        if channel.trim().is_empty() {
            return Err(NotifierError::Unavailable(
                "chat channel not configured".to_string(),
            ));
        }
        let resp = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .headers(self.auth_headers()?)
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await
            .map_err(|e| NotifierError::SendFailed(format!("chat.postMessage failed: {e}")))?;
        let envelope: SlackEnvelope = resp
            .json()
            .await
            .map_err(|e| NotifierError::SendFailed(format!("chat.postMessage body: {e}")))?;
        if envelope.ok {
            Ok(())
        } else {
            Err(NotifierError::SendFailed(
                envelope.error.unwrap_or_else(|| "chat.postMessage rejected".to_string()),
            ))
        }
    }
}
