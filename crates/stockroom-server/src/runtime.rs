// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use stockroom_ingest::{
    JsonFileSource, Reconciler, RecordSource, SheetsClient, SheetsConfig, SheetsSource,
    StaticSource,
};
use stockroom_store::LedgerStore;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::services::{
    spawn_sync_task, ChatNotifier, DisabledMirror, HistoryMirror, NotifierSettings,
    ProcessorOptions, SheetsHistoryMirror, SlackNotifier, SyncService, TransactionProcessor,
};
use crate::{build_router, validate_startup_config_contract, AppState, ServerConfig};

/// `STOCKROOM_LOG_LEVEL` first, then `RUST_LOG`, then `info`.
fn log_filter(log_level: Option<&str>) -> EnvFilter {
    log_level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Installs the global subscriber. Safe to call more than once.
pub fn init_tracing(log_json: bool, log_level: Option<&str>) {
    let filter = log_filter(log_level);
    let installed = if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed");
    }
}

/// Wires store, integrations and services from configuration.
pub fn build_state(config: &ServerConfig) -> Result<AppState, String> {
    validate_startup_config_contract(config)?;
    let store = Arc::new(
        LedgerStore::open(&config.db_path)
            .map_err(|e| format!("open ledger {}: {e}", config.db_path.display()))?,
    );
    let settings = Arc::new(NotifierSettings::file(
        config.settings_path.clone(),
        config.chat_enabled_default,
    ));

    let source: Arc<dyn RecordSource>;
    let mirror: Arc<dyn HistoryMirror>;
    if let Some(id) = &config.spreadsheet_id {
        let client = Arc::new(SheetsClient::new(
            SheetsConfig::new(&config.sheets_api_base, id, config.sheets_access_token.clone())
                .with_timeout(config.external_timeout),
        ));
        source = Arc::new(SheetsSource::new(Arc::clone(&client)));
        mirror = Arc::new(SheetsHistoryMirror::new(client, &config.history_section));
    } else if let Some(path) = &config.source_file {
        source = Arc::new(JsonFileSource::new(path.clone()));
        mirror = Arc::new(DisabledMirror);
    } else {
        warn!("no external source configured; sync passes will be empty");
        source = Arc::new(StaticSource::new());
        mirror = Arc::new(DisabledMirror);
    }

    let notifier: Arc<dyn ChatNotifier> = Arc::new(SlackNotifier::new(
        &config.slack_api_base,
        config.slack_bot_token.clone(),
        config.external_timeout,
    ));
    let options = ProcessorOptions {
        chat_channel: config.slack_channel.clone().unwrap_or_default(),
        people_section: config.people_section.clone(),
        external_timeout: config.external_timeout,
    };
    let processor = TransactionProcessor::new(
        Arc::clone(&store),
        notifier,
        mirror,
        Arc::clone(&settings),
        options,
    )
    .with_people_source(Arc::clone(&source));

    let reconciler = Arc::new(
        Reconciler::new(store, config.sections.clone())
            .with_fetch_timeout(config.sync_fetch_timeout),
    );
    let sync = Arc::new(SyncService::new(reconciler, source));
    Ok(AppState::new(Arc::new(processor), sync, settings))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), String> {
    let state = build_state(&config)?;
    let sync_task = spawn_sync_task(Arc::clone(&state.sync), config.sync_interval);
    let app = build_router(state);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {addr} failed: {e}"))?;
    info!(
        bind = %addr,
        db_path = %config.db_path.display(),
        sections = ?config.sections,
        "stockroom-server listening"
    );
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {e}"));
    if let Some(task) = sync_task {
        task.abort();
    }
    info!("stockroom-server stopped");
    served
}
