// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use std::collections::BTreeSet;
use stockroom_model::{ItemId, NewUsageRecord, UsageRecord};

use crate::rows::{usage_from_row, USAGE_COLUMNS};
use crate::{sql_limit, LedgerStore, StoreError};

impl LedgerStore {
    pub fn add_usage_record(&self, record: &NewUsageRecord) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Ok(insert_usage(&conn, record)?)
    }

    /// Opens up to `count` records for `actor`, taking `codes` in order and
    /// skipping codes another record already holds. The read and the inserts
    /// share one immediate transaction. Returns the codes assigned.
    pub fn assign_usage_codes(
        &self,
        item_id: ItemId,
        codes: &[String],
        actor: &str,
        count: usize,
        checked_out_at: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let held: BTreeSet<String> = {
            let mut stmt = tx.prepare_cached(
                "SELECT code FROM usage_records WHERE item_id = ?1 AND code IS NOT NULL",
            )?;
            let rows = stmt.query_map([item_id], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let mut assigned = Vec::new();
        for code in codes.iter().filter(|c| !held.contains(*c)).take(count) {
            insert_usage(
                &tx,
                &NewUsageRecord {
                    item_id,
                    code: Some(code.clone()),
                    actor: actor.to_string(),
                    checked_out_at,
                    expected_return_at: None,
                },
            )?;
            assigned.push(code.clone());
        }
        tx.commit()?;
        Ok(assigned)
    }

    /// Removes up to `count` records held by `actor` for the item, oldest
    /// first, and returns how many were removed.
    pub fn remove_usage_records(
        &self,
        item_id: ItemId,
        actor: &str,
        count: usize,
    ) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM usage_records WHERE id IN (
               SELECT id FROM usage_records
               WHERE item_id = ?1 AND actor = ?2
               ORDER BY checked_out_at ASC, id ASC
               LIMIT ?3
             )",
            params![item_id, actor, sql_limit(count)],
        )?;
        Ok(removed)
    }

    pub fn list_usage_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {USAGE_COLUMNS} FROM usage_records ORDER BY checked_out_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], usage_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_usage_records_for_item(
        &self,
        item_id: ItemId,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {USAGE_COLUMNS} FROM usage_records
             WHERE item_id = ?1 ORDER BY checked_out_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([item_id], usage_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn insert_usage(conn: &Connection, record: &NewUsageRecord) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO usage_records (item_id, code, actor, checked_out_at, expected_return_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.item_id,
            record.code,
            record.actor,
            record.checked_out_at,
            record.expected_return_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
