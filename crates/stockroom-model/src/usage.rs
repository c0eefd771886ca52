// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ItemId;

/// One unit currently checked out. Codes are best-effort tracking; the item
/// row's `in_use` count stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageRecord {
    pub id: i64,
    pub item_id: ItemId,
    pub code: Option<String>,
    pub actor: String,
    pub checked_out_at: DateTime<Utc>,
    pub expected_return_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUsageRecord {
    pub item_id: ItemId,
    pub code: Option<String>,
    pub actor: String,
    pub checked_out_at: DateTime<Utc>,
    pub expected_return_at: Option<DateTime<Utc>>,
}
