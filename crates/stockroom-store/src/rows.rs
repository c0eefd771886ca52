// SPDX-License-Identifier: Apache-2.0

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};
use stockroom_model::{split_codes, Item, ItemId, Transaction, TransactionKind, UsageRecord};

use rusqlite::Connection;

pub(crate) const ITEM_COLUMNS: &str = "id, name, category, location, total, available, in_use, \
     minimum_stock, codes, origin, synced_at, updated_at";

pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, kind, item_id, item_name, quantity, actor, balance_after, timestamp";

pub(crate) const USAGE_COLUMNS: &str =
    "id, item_id, code, actor, checked_out_at, expected_return_at";

pub(crate) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let codes: String = row.get(8)?;
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        location: row.get(3)?,
        total: row.get(4)?,
        available: row.get(5)?,
        in_use: row.get(6)?,
        minimum_stock: row.get(7)?,
        codes: split_codes(&codes),
        origin: row.get(9)?,
        synced_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub(crate) fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let raw_kind: String = row.get(1)?;
    let kind = raw_kind
        .parse::<TransactionKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(Transaction {
        id: row.get(0)?,
        kind,
        item_id: row.get(2)?,
        item_name: row.get(3)?,
        quantity: row.get(4)?,
        actor: row.get(5)?,
        balance_after: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

pub(crate) fn usage_from_row(row: &Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        id: row.get(0)?,
        item_id: row.get(1)?,
        code: row.get(2)?,
        actor: row.get(3)?,
        checked_out_at: row.get(4)?,
        expected_return_at: row.get(5)?,
    })
}

pub(crate) fn find_item_by_id(conn: &Connection, id: ItemId) -> rusqlite::Result<Option<Item>> {
    conn.prepare_cached(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"))?
        .query_row([id], item_from_row)
        .optional()
}

/// Origin is compared case-insensitively through the column collation.
pub(crate) fn find_item_by_key(
    conn: &Connection,
    name: &str,
    origin: &str,
) -> rusqlite::Result<Option<Item>> {
    conn.prepare_cached(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE name = ?1 AND origin = ?2"
    ))?
    .query_row([name, origin], item_from_row)
    .optional()
}
