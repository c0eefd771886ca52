// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod json_file;
mod logging;
mod people;
mod plan;
mod reconcile;
mod sheets;
mod source;
mod static_source;

pub use json_file::JsonFileSource;
pub use logging::{ReconcileEvent, ReconcileLog, ReconcileStage};
pub use people::{chat_identity_from_rows, lookup_chat_identity, CHAT_ID_COLUMNS, PERSON_NAME_COLUMNS};
pub use plan::{group_records, plan_item_change, ItemChange, RecordGroup};
pub use reconcile::{ReconcileError, ReconcileReport, Reconciler, DEFAULT_FETCH_TIMEOUT};
pub use sheets::{rows_from_values, SheetsClient, SheetsConfig, SheetsSource};
pub use source::{RecordSource, SourceError};
pub use static_source::StaticSource;

pub const CRATE_NAME: &str = "stockroom-ingest";

pub const DEFAULT_SECTIONS: &[&str] = &["Produto", "Mecânica", "Eletrônica"];
pub const DEFAULT_HISTORY_SECTION: &str = "HISTÓRICO";
pub const DEFAULT_PEOPLE_SECTION: &str = "PESSOAS";
