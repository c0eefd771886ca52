// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use stockroom_model::{ExternalRecord, Item, ItemKey, ItemUpsert};
use tracing::warn;

/// All external records sharing one `(name, origin)` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordGroup {
    pub key: ItemKey,
    pub total: i64,
    /// Non-empty codes in encounter order, duplicates kept.
    pub codes: Vec<String>,
    pub category: Option<String>,
    pub location: Option<String>,
}

/// Groups records by `(name, origin)`. Records whose name or origin fails key
/// validation are dropped with a warning. The same name under two origins
/// yields two groups.
#[must_use]
pub fn group_records<I>(records: I) -> Vec<RecordGroup>
where
    I: IntoIterator<Item = ExternalRecord>,
{
    let mut groups: BTreeMap<ItemKey, RecordGroup> = BTreeMap::new();
    for record in records {
        let key = match ItemKey::new(&record.name, &record.origin) {
            Ok(key) => key,
            Err(err) => {
                warn!(
                    origin = %record.origin,
                    name_len = record.name.len(),
                    error = %err,
                    "external record rejected"
                );
                continue;
            }
        };
        let group = groups.entry(key.clone()).or_insert_with(|| RecordGroup {
            key,
            total: 0,
            codes: Vec::new(),
            category: None,
            location: None,
        });
        group.total += 1;
        if let Some(code) = record.code.filter(|c| !c.trim().is_empty()) {
            group.codes.push(code);
        }
        if group.category.is_none() {
            group.category = record.category;
        }
        if group.location.is_none() {
            group.location = record.location;
        }
    }
    groups.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChange {
    Create(ItemUpsert),
    /// Total moved by `diff`; the difference lands in the available pool.
    /// `shortfall` is set when available had to be clamped at zero.
    Adjust {
        upsert: ItemUpsert,
        diff: i64,
        shortfall: Option<i64>,
    },
    /// Quantities untouched; only category, location, codes or origin spelling.
    Metadata {
        upsert: ItemUpsert,
        origin_changed: bool,
    },
    Unchanged,
}

impl ItemChange {
    #[must_use]
    pub fn upsert(&self) -> Option<&ItemUpsert> {
        match self {
            Self::Create(upsert)
            | Self::Adjust { upsert, .. }
            | Self::Metadata { upsert, .. } => Some(upsert),
            Self::Unchanged => None,
        }
    }

    #[must_use]
    pub fn counts_as_updated(&self) -> bool {
        match self {
            Self::Adjust { .. } => true,
            Self::Metadata { origin_changed, .. } => *origin_changed,
            Self::Create(_) | Self::Unchanged => false,
        }
    }
}

/// Decides what one group does to the stored item. In-use units are never
/// touched: a change in total flows entirely through `available`.
#[must_use]
pub fn plan_item_change(
    existing: Option<&Item>,
    group: &RecordGroup,
    synced_at: DateTime<Utc>,
) -> ItemChange {
    let Some(item) = existing else {
        let mut upsert = ItemUpsert::fresh(group.key.clone(), group.total);
        upsert.category = group.category.clone();
        upsert.location = group.location.clone();
        upsert.codes = group.codes.clone();
        upsert.synced_at = Some(synced_at);
        return ItemChange::Create(upsert);
    };

    let origin_changed = item.origin != group.key.origin;
    let metadata_changed = origin_changed
        || item.category != group.category
        || item.location != group.location
        || item.codes != group.codes;

    let mut upsert = ItemUpsert {
        name: item.name.clone(),
        origin: group.key.origin.clone(),
        category: group.category.clone(),
        location: group.location.clone(),
        total: item.total,
        available: item.available,
        in_use: item.in_use,
        minimum_stock: None,
        codes: group.codes.clone(),
        synced_at: Some(synced_at),
    };

    if group.total != item.total {
        let diff = group.total - item.total;
        let mut available = item.available + diff;
        let mut shortfall = None;
        if available < 0 {
            shortfall = Some(-available);
            available = 0;
        }
        let total = available + item.in_use;
        if total != item.total || available != item.available || metadata_changed {
            upsert.total = total;
            upsert.available = available;
            return ItemChange::Adjust {
                upsert,
                diff,
                shortfall,
            };
        }
        // Clamped to the same state as last time; nothing new to write.
        return ItemChange::Unchanged;
    }

    if metadata_changed {
        return ItemChange::Metadata {
            upsert,
            origin_changed,
        };
    }
    ItemChange::Unchanged
}
