// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Directory holding the ledger database and persisted settings.
#[must_use]
pub fn resolve_stockroom_data_dir() -> PathBuf {
    if let Ok(explicit) = std::env::var(crate::ENV_STOCKROOM_DATA_DIR) {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        let trimmed = xdg_data_home.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join("stockroom");
        }
    }

    PathBuf::from("data")
}
