// SPDX-License-Identifier: Apache-2.0

use rusqlite::Connection;

use crate::StoreError;

pub const LEDGER_SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS items (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  name_normalized TEXT NOT NULL,
  category TEXT,
  location TEXT,
  total INTEGER NOT NULL CHECK (total >= 0),
  available INTEGER NOT NULL CHECK (available >= 0),
  in_use INTEGER NOT NULL CHECK (in_use >= 0),
  minimum_stock INTEGER NOT NULL CHECK (minimum_stock >= 0),
  codes TEXT NOT NULL DEFAULT '',
  origin TEXT NOT NULL COLLATE NOCASE,
  synced_at TEXT,
  updated_at TEXT NOT NULL,
  CHECK (available + in_use = total),
  UNIQUE (name, origin)
);
CREATE INDEX IF NOT EXISTS idx_items_name ON items(name);
CREATE INDEX IF NOT EXISTS idx_items_name_normalized ON items(name_normalized);

CREATE TABLE IF NOT EXISTS transactions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  kind TEXT NOT NULL CHECK (kind IN ('check_out', 'check_in')),
  item_id INTEGER NOT NULL,
  item_name TEXT NOT NULL,
  quantity INTEGER NOT NULL CHECK (quantity > 0),
  actor TEXT NOT NULL,
  balance_after INTEGER NOT NULL,
  timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_timestamp ON transactions(timestamp);
CREATE INDEX IF NOT EXISTS idx_transactions_item ON transactions(item_id, timestamp);

CREATE TABLE IF NOT EXISTS usage_records (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
  code TEXT,
  actor TEXT NOT NULL,
  checked_out_at TEXT NOT NULL,
  expected_return_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_usage_records_item_actor ON usage_records(item_id, actor, checked_out_at);
";

pub(crate) fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        PRAGMA temp_store=MEMORY;
        ",
    )?;
    Ok(())
}

pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > LEDGER_SCHEMA_VERSION {
        return Err(StoreError::new(
            crate::StoreErrorCode::Validation,
            format!(
                "ledger schema version {version} is newer than supported {LEDGER_SCHEMA_VERSION}"
            ),
        ));
    }
    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.execute_batch(&format!("PRAGMA user_version={LEDGER_SCHEMA_VERSION};"))?;
    }
    Ok(())
}
