// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileSummary {
    pub records_read: usize,
    pub unique_items: usize,
    pub items_created: usize,
    pub items_updated: usize,
    #[serde(default)]
    pub sections_read: Vec<String>,
    #[serde(default)]
    pub sections_missing: Vec<String>,
}
