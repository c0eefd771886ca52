// SPDX-License-Identifier: Apache-2.0

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use stockroom_core::ErrorCode;
use stockroom_model::{Item, ItemId, TransactionKind, TransactionRequest};
use stockroom_server::{build_state, run_server, AppState, NotifierSettings, ServerConfig};
use stockroom_store::LedgerStore;
use tracing::info;

use crate::output::{emit_ok, CliError, OutputMode};

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::internal(&format!("start async runtime: {e}")))
}

fn open_store(config: &ServerConfig) -> Result<LedgerStore, CliError> {
    Ok(LedgerStore::open(&config.db_path)?)
}

fn wire(config: &ServerConfig) -> Result<AppState, CliError> {
    build_state(config).map_err(|e| CliError::from_code(ErrorCode::ValidationFailed, &e))
}

/// A local file replaces the spreadsheet for this run.
pub(crate) fn sync(
    mut config: ServerConfig,
    file: Option<PathBuf>,
    full: bool,
    sections: Vec<String>,
    mode: OutputMode,
) -> Result<(), CliError> {
    if let Some(path) = file {
        config.spreadsheet_id = None;
        config.sheets_access_token = None;
        config.source_file = Some(path);
    } else if !config.sheets_enabled() && config.source_file.is_none() {
        return Err(CliError::from_code(
            ErrorCode::ExternalSourceUnavailable,
            "no source: pass --file or set STOCKROOM_SHEETS_SPREADSHEET_ID",
        ));
    }
    if !sections.is_empty() {
        config.sections = sections;
    }
    let state = wire(&config)?;
    let report = runtime()?.block_on(state.sync.run(full))?;
    info!(
        records_read = report.summary.records_read,
        full,
        "sync finished"
    );
    emit_ok(mode, &report)
}

pub(crate) fn list_items(
    config: &ServerConfig,
    low_stock: bool,
    mode: OutputMode,
) -> Result<(), CliError> {
    let mut items = open_store(config)?.list_items()?;
    if low_stock {
        items.retain(Item::is_below_minimum);
    }
    emit_ok(mode, &items)
}

pub(crate) fn show_item(
    config: &ServerConfig,
    id: ItemId,
    mode: OutputMode,
) -> Result<(), CliError> {
    match open_store(config)?.get_item(id)? {
        Some(item) => emit_ok(mode, &item),
        None => Err(CliError::from_code(
            ErrorCode::NotFound,
            &format!("item {id} not found"),
        )),
    }
}

pub(crate) fn search(
    config: &ServerConfig,
    query: &str,
    limit: usize,
    mode: OutputMode,
) -> Result<(), CliError> {
    if query.trim().chars().count() < 2 {
        return Err(CliError::from_code(
            ErrorCode::ValidationFailed,
            "search query must have at least 2 characters",
        ));
    }
    emit_ok(mode, &open_store(config)?.search_items(query.trim(), limit)?)
}

pub(crate) fn history(
    config: &ServerConfig,
    item: Option<ItemId>,
    limit: usize,
    mode: OutputMode,
) -> Result<(), CliError> {
    let store = open_store(config)?;
    let rows = match item {
        Some(id) => store.list_transactions_for_item(id, limit)?,
        None => store.list_transactions(limit)?,
    };
    emit_ok(mode, &rows)
}

pub(crate) fn usage(
    config: &ServerConfig,
    item: Option<ItemId>,
    mode: OutputMode,
) -> Result<(), CliError> {
    let store = open_store(config)?;
    let rows = match item {
        Some(id) => store.list_usage_records_for_item(id)?,
        None => store.list_usage_records()?,
    };
    emit_ok(mode, &rows)
}

pub(crate) fn movement(
    config: &ServerConfig,
    kind: TransactionKind,
    item_id: ItemId,
    quantity: i64,
    actor: &str,
    mode: OutputMode,
) -> Result<(), CliError> {
    let state = wire(config)?;
    let request = TransactionRequest {
        kind,
        item_id,
        quantity,
        actor: actor.to_string(),
    };
    let outcome = runtime()?.block_on(state.processor.process(request))?;
    emit_ok(mode, &outcome)
}

pub(crate) fn notifier(
    config: &ServerConfig,
    enable: Option<bool>,
    mode: OutputMode,
) -> Result<(), CliError> {
    let settings = Arc::new(NotifierSettings::file(
        config.settings_path.clone(),
        config.chat_enabled_default,
    ));
    let chat_enabled = runtime()?.block_on(async {
        if let Some(enabled) = enable {
            settings
                .set_enabled(enabled)
                .await
                .map_err(|e| CliError::internal(&e.to_string()))?;
        }
        Ok::<bool, CliError>(settings.is_enabled().await)
    })?;
    emit_ok(
        mode,
        &json!({
            "chat_enabled": chat_enabled,
            "notifier_configured": config.notifier_configured(),
            "settings_path": config.settings_path,
        }),
    )
}

pub(crate) fn serve(config: ServerConfig) -> Result<(), CliError> {
    runtime()?
        .block_on(run_server(config))
        .map_err(|e| CliError::internal(&e))
}
