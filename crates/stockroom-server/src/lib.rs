// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Stockroom server: transaction processing, notifier toggle, periodic sync
//! and the HTTP surface over the ledger.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use stockroom_store::LedgerStore;

mod config;
mod fakes;
mod http;
mod middleware;
mod runtime;
mod services;

pub use config::{
    validate_startup_config_contract, ServerConfig, CONFIG_SCHEMA_VERSION, DEFAULT_BIND,
    DEFAULT_SHEETS_API_BASE, DEFAULT_SLACK_API_BASE,
};
pub use fakes::{FakeMirror, FakeNotifier};
pub use runtime::{build_state, init_tracing, run_server};
pub use services::{
    history_row, notification_text, spawn_sync_task, ChatNotifier, DisabledMirror, HistoryMirror,
    MirrorError, NotifierError, NotifierSettings, NotifierToggle, ProcessorOptions,
    SettingsError, SheetsHistoryMirror, SlackNotifier, SyncService, TransactionError,
    TransactionProcessor, HISTORY_HEADER,
};

pub const CRATE_NAME: &str = "stockroom-server";

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LedgerStore>,
    pub processor: Arc<TransactionProcessor>,
    pub sync: Arc<SyncService>,
    pub settings: Arc<NotifierSettings>,
    pub request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(
        processor: Arc<TransactionProcessor>,
        sync: Arc<SyncService>,
        settings: Arc<NotifierSettings>,
    ) -> Self {
        Self {
            store: Arc::clone(processor.store()),
            processor,
            sync,
            settings,
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(http::handlers::health_handler))
        .route("/api/items", get(http::handlers::list_items_handler))
        .route("/api/items/search", get(http::handlers::search_items_handler))
        .route("/api/items/:id", get(http::handlers::get_item_handler))
        .route("/api/sync", post(http::handlers::sync_handler))
        .route("/api/transactions", post(http::handlers::transaction_handler))
        .route("/api/history", get(http::handlers::history_handler))
        .route(
            "/api/history/item/:id",
            get(http::handlers::item_history_handler),
        )
        .route("/api/usage", get(http::handlers::usage_handler))
        .route("/api/usage/item/:id", get(http::handlers::item_usage_handler))
        .route(
            "/api/settings/notifier",
            get(http::handlers::get_notifier_settings_handler)
                .post(http::handlers::set_notifier_settings_handler),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
