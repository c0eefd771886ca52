// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::{ItemId, ValidationError};

pub const ACTOR_MAX_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[serde(alias = "retirada")]
    CheckOut,
    #[serde(alias = "devolucao", alias = "devolução")]
    CheckIn,
}

impl TransactionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckOut => "check_out",
            Self::CheckIn => "check_in",
        }
    }

    /// Label used in chat messages and mirrored history rows.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CheckOut => "RETIRADA",
            Self::CheckIn => "DEVOLUÇÃO",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "check_out" | "check-out" | "checkout" | "retirada" => Ok(Self::CheckOut),
            "check_in" | "check-in" | "checkin" | "devolucao" | "devolução" => Ok(Self::CheckIn),
            other => Err(ValidationError(format!(
                "unknown transaction kind `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    pub id: i64,
    pub kind: TransactionKind,
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: i64,
    pub actor: String,
    pub balance_after: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: i64,
    pub actor: String,
    pub balance_after: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionRequest {
    pub kind: TransactionKind,
    pub item_id: ItemId,
    pub quantity: i64,
    pub actor: String,
}

impl TransactionRequest {
    /// Returns the trimmed actor name on success.
    pub fn validate(&self) -> Result<String, ValidationError> {
        if self.quantity <= 0 {
            return Err(ValidationError(format!(
                "quantity must be greater than zero, got {}",
                self.quantity
            )));
        }
        let actor = self.actor.trim();
        if actor.is_empty() {
            return Err(ValidationError("actor name must not be empty".to_string()));
        }
        if actor.len() > ACTOR_MAX_LEN {
            return Err(ValidationError(format!(
                "actor name exceeds max length {ACTOR_MAX_LEN}"
            )));
        }
        Ok(actor.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChange {
    pub new_available: i64,
    pub new_in_use: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementError {
    InsufficientStock { available: i64 },
    InvalidQuantity { in_use: i64 },
}

impl Display for MovementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientStock { available } => {
                write!(f, "insufficient stock: only {available} available")
            }
            Self::InvalidQuantity { in_use } => {
                write!(f, "invalid quantity: only {in_use} in use")
            }
        }
    }
}

impl std::error::Error for MovementError {}

/// Moves `quantity` units between the available pool and the in-use pool.
/// `quantity` must already be validated as positive.
pub fn plan_movement(
    kind: TransactionKind,
    available: i64,
    in_use: i64,
    quantity: i64,
) -> Result<QuantityChange, MovementError> {
    match kind {
        TransactionKind::CheckOut => {
            if available < quantity {
                return Err(MovementError::InsufficientStock { available });
            }
            Ok(QuantityChange {
                new_available: available - quantity,
                new_in_use: in_use + quantity,
            })
        }
        TransactionKind::CheckIn => {
            if in_use < quantity {
                return Err(MovementError::InvalidQuantity { in_use });
            }
            Ok(QuantityChange {
                new_available: available + quantity,
                new_in_use: in_use - quantity,
            })
        }
    }
}

/// Result of one best-effort side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum EffectStatus {
    Applied,
    Skipped,
    Failed(String),
}

impl EffectStatus {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectReport {
    /// Usage records created (check-out) or removed (check-in).
    pub usage_records: usize,
    pub chat_identity: Option<String>,
    pub notification: EffectStatus,
    pub mirror: EffectStatus,
}

impl Default for SideEffectReport {
    fn default() -> Self {
        Self {
            usage_records: 0,
            chat_identity: None,
            notification: EffectStatus::Skipped,
            mirror: EffectStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub success: bool,
    pub message: String,
    pub transaction_id: i64,
    pub new_balance: i64,
    pub notified: bool,
    pub side_effects: SideEffectReport,
}
