// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::ValidationError;

pub type ItemId = i64;

pub const NAME_MAX_LEN: usize = 256;
pub const ORIGIN_MAX_LEN: usize = 128;

/// Identity of an item: the same name under two origin tags is two items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemKey {
    pub name: String,
    pub origin: String,
}

impl ItemKey {
    pub fn new(name: &str, origin: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        let origin = origin.trim();
        if name.is_empty() {
            return Err(ValidationError("item name must not be empty".to_string()));
        }
        if name.len() > NAME_MAX_LEN {
            return Err(ValidationError(format!(
                "item name exceeds max length {NAME_MAX_LEN}"
            )));
        }
        if origin.is_empty() {
            return Err(ValidationError("origin tag must not be empty".to_string()));
        }
        if origin.len() > ORIGIN_MAX_LEN {
            return Err(ValidationError(format!(
                "origin tag exceeds max length {ORIGIN_MAX_LEN}"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            origin: origin.to_string(),
        })
    }
}

impl Display for ItemKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.name, self.origin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub total: i64,
    pub available: i64,
    pub in_use: i64,
    pub minimum_stock: i64,
    pub codes: Vec<String>,
    pub origin: String,
    pub synced_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            name: self.name.clone(),
            origin: self.origin.clone(),
        }
    }

    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.available >= 0 && self.in_use >= 0 && self.available + self.in_use == self.total
    }

    #[must_use]
    pub fn is_below_minimum(&self) -> bool {
        self.available < self.minimum_stock
    }
}

/// Full row image handed to the store. The caller computes quantities; the
/// store only fills `minimum_stock` when it is absent on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemUpsert {
    pub name: String,
    pub origin: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub total: i64,
    pub available: i64,
    pub in_use: i64,
    pub minimum_stock: Option<i64>,
    pub codes: Vec<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl ItemUpsert {
    /// Fresh item as first seen by a reconciliation pass: everything available.
    #[must_use]
    pub fn fresh(key: ItemKey, total: i64) -> Self {
        Self {
            name: key.name,
            origin: key.origin,
            category: None,
            location: None,
            total,
            available: total,
            in_use: 0,
            minimum_stock: Some(default_minimum_stock(total)),
            codes: Vec::new(),
            synced_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ItemKey::new(&self.name, &self.origin)?;
        if self.available < 0 || self.in_use < 0 {
            return Err(ValidationError(format!(
                "quantities must be non-negative (available={}, in_use={})",
                self.available, self.in_use
            )));
        }
        if self.available + self.in_use != self.total {
            return Err(ValidationError(format!(
                "available + in_use must equal total ({} + {} != {})",
                self.available, self.in_use, self.total
            )));
        }
        if self.minimum_stock.is_some_and(|m| m < 0) {
            return Err(ValidationError(
                "minimum stock must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// `max(2, floor(20% of total))`.
#[must_use]
pub fn default_minimum_stock(total: i64) -> i64 {
    (total.max(0) / 5).max(2)
}

#[must_use]
pub fn join_codes(codes: &[String]) -> String {
    codes.join(",")
}

#[must_use]
pub fn split_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_stock_defaults_to_twenty_percent_with_floor_of_two() {
        assert_eq!(default_minimum_stock(0), 2);
        assert_eq!(default_minimum_stock(5), 2);
        assert_eq!(default_minimum_stock(14), 2);
        assert_eq!(default_minimum_stock(15), 3);
        assert_eq!(default_minimum_stock(100), 20);
    }

    #[test]
    fn codes_round_trip_through_comma_join_and_keep_duplicates() {
        let codes = vec!["A1".to_string(), "A2".to_string(), "A1".to_string()];
        let joined = join_codes(&codes);
        assert_eq!(joined, "A1,A2,A1");
        assert_eq!(split_codes(&joined), codes);
        assert!(split_codes("").is_empty());
        assert_eq!(split_codes(" X , ,Y"), vec!["X", "Y"]);
    }

    #[test]
    fn item_key_trims_and_rejects_blank_parts() {
        let key = ItemKey::new("  Drill ", " Mechanics").expect("key");
        assert_eq!(key.name, "Drill");
        assert_eq!(key.origin, "Mechanics");
        assert_eq!(key.to_string(), "Drill|Mechanics");
        assert!(ItemKey::new("   ", "Mechanics").is_err());
        assert!(ItemKey::new("Drill", "").is_err());
    }

    #[test]
    fn upsert_validation_enforces_the_quantity_split() {
        let key = ItemKey::new("Gloves", "Safety").expect("key");
        let mut upsert = ItemUpsert::fresh(key, 5);
        assert!(upsert.validate().is_ok());
        upsert.available = 4;
        assert!(upsert.validate().is_err());
        upsert.in_use = 1;
        assert!(upsert.validate().is_ok());
        upsert.available = -1;
        upsert.in_use = 6;
        assert!(upsert.validate().is_err());
    }
}
