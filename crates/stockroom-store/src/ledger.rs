// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::fmt::{Display, Formatter};
use stockroom_model::{
    plan_movement, Item, ItemId, MovementError, NewTransaction, Transaction, TransactionKind,
};
use tracing::error;

use crate::rows::{find_item_by_id, transaction_from_row, TRANSACTION_COLUMNS};
use crate::{sql_limit, LedgerStore, StoreError, StoreErrorCode};

/// State after a committed check-out or check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementCommit {
    pub item: Item,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementFailure {
    NotFound(ItemId),
    Rejected(MovementError),
    /// The quantity update touched no row although the item was just read.
    Inconsistent(ItemId),
    Store(StoreError),
}

impl Display for MovementFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "item {id} not found"),
            Self::Rejected(e) => write!(f, "{e}"),
            Self::Inconsistent(id) => write!(f, "quantity update for item {id} affected no row"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MovementFailure {}

impl From<StoreError> for MovementFailure {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<rusqlite::Error> for MovementFailure {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.into())
    }
}

impl LedgerStore {
    /// Append-only.
    pub fn record_transaction(&self, new: &NewTransaction) -> Result<i64, StoreError> {
        if new.quantity <= 0 {
            return Err(StoreError::new(
                StoreErrorCode::Validation,
                "transaction quantity must be greater than zero",
            ));
        }
        let conn = self.lock()?;
        Ok(insert_transaction(&conn, new)?)
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .prepare_cached(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
            ))?
            .query_row([id], transaction_from_row)
            .optional()?;
        Ok(found)
    }

    /// Most recent first.
    pub fn list_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             ORDER BY timestamp DESC, id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map([sql_limit(limit)], transaction_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_transactions_for_item(
        &self,
        item_id: ItemId,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE item_id = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![item_id, sql_limit(limit)], transaction_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Read, validate, update quantities and append the transaction record as
    /// one immediate SQLite transaction. Either both writes land or neither.
    pub fn apply_movement(
        &self,
        kind: TransactionKind,
        item_id: ItemId,
        quantity: i64,
        actor: &str,
    ) -> Result<MovementCommit, MovementFailure> {
        if quantity <= 0 {
            return Err(StoreError::new(
                StoreErrorCode::Validation,
                format!("quantity must be greater than zero, got {quantity}"),
            )
            .into());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = commit_timestamp(&tx, self.clock.now())?;

        let item = find_item_by_id(&tx, item_id)?.ok_or(MovementFailure::NotFound(item_id))?;
        let change = plan_movement(kind, item.available, item.in_use, quantity)
            .map_err(MovementFailure::Rejected)?;

        let updated = tx.execute(
            "UPDATE items SET available = ?1, in_use = ?2, updated_at = ?3 WHERE id = ?4",
            params![change.new_available, change.new_in_use, now, item_id],
        )?;
        if updated != 1 {
            error!(
                item_id,
                updated,
                kind = kind.as_str(),
                "quantity update affected no row; rolling back movement"
            );
            return Err(MovementFailure::Inconsistent(item_id));
        }

        let new = NewTransaction {
            kind,
            item_id,
            item_name: item.name.clone(),
            quantity,
            actor: actor.to_string(),
            balance_after: change.new_available,
            timestamp: now,
        };
        let id = insert_transaction(&tx, &new)?;
        tx.commit()?;

        Ok(MovementCommit {
            transaction: Transaction {
                id,
                kind: new.kind,
                item_id: new.item_id,
                item_name: new.item_name,
                quantity: new.quantity,
                actor: new.actor,
                balance_after: new.balance_after,
                timestamp: new.timestamp,
            },
            item: Item {
                available: change.new_available,
                in_use: change.new_in_use,
                updated_at: now,
                ..item
            },
        })
    }
}

/// Stamped inside the write transaction and never earlier than the newest
/// recorded movement, so timestamp order matches commit order.
fn commit_timestamp(
    conn: &Connection,
    now: DateTime<Utc>,
) -> rusqlite::Result<DateTime<Utc>> {
    let latest: Option<DateTime<Utc>> =
        conn.query_row("SELECT MAX(timestamp) FROM transactions", [], |row| row.get(0))?;
    Ok(latest.map_or(now, |latest| latest.max(now)))
}

fn insert_transaction(conn: &Connection, new: &NewTransaction) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO transactions (
           kind, item_id, item_name, quantity, actor, balance_after, timestamp
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.kind.as_str(),
            new.item_id,
            new.item_name,
            new.quantity,
            new.actor,
            new.balance_after,
            new.timestamp
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
