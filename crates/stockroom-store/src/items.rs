// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use stockroom_model::{default_minimum_stock, join_codes, Item, ItemId, ItemUpsert};
use tracing::debug;

use crate::rows::{find_item_by_id, find_item_by_key, item_from_row, ITEM_COLUMNS};
use crate::{sql_limit, LedgerStore, StoreError, StoreErrorCode};

impl LedgerStore {
    pub fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let conn = self.lock()?;
        Ok(find_item_by_id(&conn, id)?)
    }

    pub fn get_item_by_name_and_origin(
        &self,
        name: &str,
        origin: &str,
    ) -> Result<Option<Item>, StoreError> {
        let conn = self.lock()?;
        Ok(find_item_by_key(&conn, name.trim(), origin.trim())?)
    }

    pub fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY name, origin, id"
        ))?;
        let rows = stmt.query_map([], item_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Case-insensitive substring match on the item name.
    pub fn search_items(&self, query: &str, limit: usize) -> Result<Vec<Item>, StoreError> {
        let pattern = format!("%{}%", escape_like(&query.trim().to_lowercase()));
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE name_normalized LIKE ?1 ESCAPE '\\'
             ORDER BY name, origin, id
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![pattern, sql_limit(limit)], item_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Inserts or overwrites the row identified by `(name, origin)` and
    /// returns its id. Quantities are written exactly as given.
    pub fn upsert_item(&self, upsert: &ItemUpsert) -> Result<ItemId, StoreError> {
        upsert.validate()?;
        let conn = self.lock()?;
        let now = self.clock.now();
        upsert_locked(&conn, upsert, now)
    }

    /// Atomic read-plan-write for one item key. `plan` sees the current row
    /// (if any) and returns the row image to write, plus a value handed back
    /// to the caller. Nothing is written when the image is `None`.
    pub fn merge_item<T, F>(&self, name: &str, origin: &str, plan: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<&Item>) -> (Option<ItemUpsert>, T),
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = self.clock.now();
        let current = find_item_by_key(&tx, name.trim(), origin.trim())?;
        let (image, value) = plan(current.as_ref());
        if let Some(image) = image {
            image.validate()?;
            upsert_locked(&tx, &image, now)?;
        }
        tx.commit()?;
        Ok(value)
    }

    /// Returns `false` when no row has this id. The row check constraint
    /// rejects values that would break `available + in_use == total`.
    pub fn apply_quantity_delta(
        &self,
        id: ItemId,
        new_available: i64,
        new_in_use: i64,
    ) -> Result<bool, StoreError> {
        if new_available < 0 || new_in_use < 0 {
            return Err(StoreError::new(
                StoreErrorCode::Validation,
                format!(
                    "quantities must be non-negative (available={new_available}, in_use={new_in_use})"
                ),
            ));
        }
        let conn = self.lock()?;
        let now = self.clock.now();
        let updated = conn.execute(
            "UPDATE items SET available = ?1, in_use = ?2, updated_at = ?3 WHERE id = ?4",
            params![new_available, new_in_use, now, id],
        )?;
        Ok(updated == 1)
    }

    /// Drops every item and its usage records. Transactions are kept.
    pub fn clear_all_items(&self) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let usage = tx.execute("DELETE FROM usage_records", [])?;
        let items = tx.execute("DELETE FROM items", [])?;
        tx.commit()?;
        debug!(items, usage, "ledger items cleared");
        Ok(items)
    }
}

pub(crate) fn upsert_locked(
    conn: &Connection,
    upsert: &ItemUpsert,
    now: DateTime<Utc>,
) -> Result<ItemId, StoreError> {
    let name = upsert.name.trim();
    let origin = upsert.origin.trim();
    let codes = join_codes(&upsert.codes);
    match find_item_by_key(conn, name, origin)? {
        Some(existing) => {
            let minimum_stock = upsert.minimum_stock.unwrap_or(existing.minimum_stock);
            conn.execute(
                "UPDATE items SET
                   name = ?1, name_normalized = ?2, category = ?3, location = ?4,
                   total = ?5, available = ?6, in_use = ?7, minimum_stock = ?8,
                   codes = ?9, origin = ?10, synced_at = ?11, updated_at = ?12
                 WHERE id = ?13",
                params![
                    name,
                    name.to_lowercase(),
                    upsert.category,
                    upsert.location,
                    upsert.total,
                    upsert.available,
                    upsert.in_use,
                    minimum_stock,
                    codes,
                    origin,
                    upsert.synced_at,
                    now,
                    existing.id
                ],
            )?;
            Ok(existing.id)
        }
        None => {
            let minimum_stock = upsert
                .minimum_stock
                .unwrap_or_else(|| default_minimum_stock(upsert.total));
            conn.execute(
                "INSERT INTO items (
                   name, name_normalized, category, location, total, available, in_use,
                   minimum_stock, codes, origin, synced_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    name,
                    name.to_lowercase(),
                    upsert.category,
                    upsert.location,
                    upsert.total,
                    upsert.available,
                    upsert.in_use,
                    minimum_stock,
                    codes,
                    origin,
                    upsert.synced_at,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
        assert_eq!(escape_like("broca"), "broca");
    }
}
