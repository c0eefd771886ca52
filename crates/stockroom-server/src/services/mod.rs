// SPDX-License-Identifier: Apache-2.0

mod mirror;
mod notifier;
mod processor;
mod settings;
mod sync;

pub use mirror::{
    history_row, DisabledMirror, HistoryMirror, MirrorError, SheetsHistoryMirror, HISTORY_HEADER,
};
pub use notifier::{notification_text, ChatNotifier, NotifierError, SlackNotifier};
pub use processor::{ProcessorOptions, TransactionError, TransactionProcessor};
pub use settings::{NotifierSettings, NotifierToggle, SettingsError};
pub use sync::{spawn_sync_task, SyncService};
