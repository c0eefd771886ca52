// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! SQLite ledger for stockroom.
//!
//! One connection sits behind a mutex, so every mutation is serialized in
//! process; multi-step mutations additionally run inside `BEGIN IMMEDIATE`
//! so a second process (the CLI next to a running server) cannot interleave.

mod error;
mod items;
mod ledger;
mod rows;
mod schema;
mod usage;

use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use stockroom_core::{Clock, SystemClock};

pub use error::{StoreError, StoreErrorCode};
pub use ledger::{MovementCommit, MovementFailure};
pub use schema::LEDGER_SCHEMA_VERSION;

pub const CRATE_NAME: &str = "stockroom-store";
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LedgerStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl LedgerStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::configure(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::new(StoreErrorCode::Internal, "ledger lock poisoned"))
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
