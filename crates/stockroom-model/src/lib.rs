// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Stockroom model SSOT.
//!
//! Quantities are signed 64-bit integers so that arithmetic on deltas can be
//! checked before it reaches the ledger; every persisted item still satisfies
//! `available + in_use == total` with both parts non-negative.

mod error;
mod item;
mod record;
mod reconcile;
mod transaction;
mod usage;

pub use error::ValidationError;
pub use item::{
    default_minimum_stock, join_codes, split_codes, Item, ItemId, ItemKey, ItemUpsert,
    NAME_MAX_LEN, ORIGIN_MAX_LEN,
};
pub use record::{
    resolve_column, ExternalRecord, SourceRow, CATEGORY_COLUMNS, CODE_COLUMNS, LOCATION_COLUMNS,
    NAME_COLUMNS,
};
pub use reconcile::ReconcileSummary;
pub use transaction::{
    plan_movement, EffectStatus, MovementError, NewTransaction, QuantityChange, SideEffectReport,
    Transaction, TransactionKind, TransactionOutcome, TransactionRequest, ACTOR_MAX_LEN,
};
pub use usage::{NewUsageRecord, UsageRecord};

pub const CRATE_NAME: &str = "stockroom-model";
