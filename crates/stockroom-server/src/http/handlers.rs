// SPDX-License-Identifier: Apache-2.0

use crate::{AppState, NotifierToggle, CONFIG_SCHEMA_VERSION, CRATE_NAME};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::HashMap;
use stockroom_core::{sha256_hex, ErrorCode, MachineError};
use stockroom_ingest::ReconcileError;
use stockroom_model::{Item, ItemId, TransactionRequest};
use stockroom_store::{LedgerStore, StoreError, StoreErrorCode, DEFAULT_SEARCH_LIMIT};
use tracing::{error, warn};

const SEARCH_MIN_CHARS: usize = 2;
const SEARCH_MAX_LIMIT: usize = 100;
const HISTORY_DEFAULT_LIMIT: usize = 50;
const HISTORY_MAX_LIMIT: usize = 200;
const ITEM_HISTORY_DEFAULT_LIMIT: usize = 20;
const ITEM_HISTORY_MAX_LIMIT: usize = 100;

pub(crate) fn api_error_response(status: StatusCode, err: MachineError) -> Response {
    let body = Json(json!({ "error": err }));
    (status, body).into_response()
}

fn validation_error(message: &str) -> Response {
    api_error_response(
        StatusCode::BAD_REQUEST,
        MachineError::from_code(ErrorCode::ValidationFailed, message),
    )
}

fn store_error_response(err: &StoreError) -> Response {
    let (status, code) = match err.code {
        StoreErrorCode::NotFound => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
        StoreErrorCode::Validation => (StatusCode::BAD_REQUEST, ErrorCode::ValidationFailed),
        StoreErrorCode::Conflict => (StatusCode::CONFLICT, ErrorCode::ValidationFailed),
        _ => {
            error!(error = %err, "store request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal)
        }
    };
    api_error_response(status, MachineError::from_code(code, &err.message))
}

pub(crate) fn if_none_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Missing → `default`; anything outside `1..=max` is rejected.
fn parse_limit(
    params: &HashMap<String, String>,
    default: usize,
    max: usize,
) -> Result<usize, Response> {
    let Some(raw) = params.get("limit") else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if (1..=max).contains(&limit) => Ok(limit),
        _ => Err(validation_error(&format!(
            "limit must be an integer between 1 and {max}"
        ))),
    }
}

/// Runs a store call on the blocking pool.
async fn with_store<T, F>(state: &AppState, work: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&LedgerStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || work(store.as_ref())).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(store_error_response(&err)),
        Err(err) => {
            error!(error = %err, "store task failed");
            Err(api_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                MachineError::from_code(ErrorCode::Internal, "store task failed"),
            ))
        }
    }
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": CRATE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "config_schema_version": CONFIG_SCHEMA_VERSION,
        "sync_source": state.sync.source_tag(),
        "notifier_configured": state.processor.notifier_configured(),
    }))
}

pub(crate) async fn list_items_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let low_stock_only = match params.get("low_stock").map(|v| v.trim()) {
        None | Some("false") | Some("0") => false,
        Some("true") | Some("1") => true,
        Some(other) => {
            return validation_error(&format!("low_stock must be true or false, got `{other}`"))
        }
    };
    let mut items = match with_store(&state, LedgerStore::list_items).await {
        Ok(items) => items,
        Err(resp) => return resp,
    };
    if low_stock_only {
        items.retain(Item::is_below_minimum);
    }
    let body = match serde_json::to_vec(&items) {
        Ok(body) => body,
        Err(err) => {
            return api_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                MachineError::from_code(ErrorCode::Internal, &format!("serialize items: {err}")),
            )
        }
    };
    let etag = format!("\"{}\"", sha256_hex(&body));
    let etag_header = HeaderValue::from_str(&etag).ok();
    if if_none_match(&headers).as_deref() == Some(etag.as_str()) {
        let mut resp = StatusCode::NOT_MODIFIED.into_response();
        if let Some(value) = etag_header {
            resp.headers_mut().insert(header::ETAG, value);
        }
        return resp;
    }
    let mut resp = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response();
    if let Some(value) = etag_header {
        resp.headers_mut().insert(header::ETAG, value);
    }
    resp
}

pub(crate) async fn search_items_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("q").map(|q| q.trim().to_string()).unwrap_or_default();
    if query.chars().count() < SEARCH_MIN_CHARS {
        return validation_error("search query must have at least 2 characters");
    }
    let limit = match parse_limit(&params, DEFAULT_SEARCH_LIMIT, SEARCH_MAX_LIMIT) {
        Ok(limit) => limit,
        Err(resp) => return resp,
    };
    match with_store(&state, move |store| store.search_items(&query, limit)).await {
        Ok(items) => Json(items).into_response(),
        Err(resp) => resp,
    }
}

pub(crate) async fn get_item_handler(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Response {
    match with_store(&state, move |store| store.get_item(id)).await {
        Ok(Some(item)) => Json(item).into_response(),
        Ok(None) => api_error_response(
            StatusCode::NOT_FOUND,
            MachineError::from_code(ErrorCode::NotFound, &format!("item {id} not found"))
                .with_detail("item_id", &id.to_string()),
        ),
        Err(resp) => resp,
    }
}

pub(crate) async fn sync_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let full = match params.get("mode").map(String::as_str) {
        None | Some("incremental") => false,
        Some("full") => true,
        Some(other) => return validation_error(&format!("unknown sync mode `{other}`")),
    };
    match state.sync.run(full).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            let status = match &err {
                ReconcileError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
                ReconcileError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(error = %err, full, "manual sync failed");
            api_error_response(status, MachineError::from_code(err.code(), &err.to_string()))
        }
    }
}

pub(crate) async fn transaction_handler(
    State(state): State<AppState>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return validation_error(&rejection.body_text()),
    };
    match state.processor.process(request).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => {
            let status = match err.code() {
                ErrorCode::NotFound => StatusCode::NOT_FOUND,
                ErrorCode::InsufficientStock | ErrorCode::InvalidQuantity => StatusCode::CONFLICT,
                ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            api_error_response(status, err.to_machine_error())
        }
    }
}

pub(crate) async fn history_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit = match parse_limit(&params, HISTORY_DEFAULT_LIMIT, HISTORY_MAX_LIMIT) {
        Ok(limit) => limit,
        Err(resp) => return resp,
    };
    match with_store(&state, move |store| store.list_transactions(limit)).await {
        Ok(rows) => Json(rows).into_response(),
        Err(resp) => resp,
    }
}

pub(crate) async fn item_history_handler(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit = match parse_limit(&params, ITEM_HISTORY_DEFAULT_LIMIT, ITEM_HISTORY_MAX_LIMIT) {
        Ok(limit) => limit,
        Err(resp) => return resp,
    };
    match with_store(&state, move |store| store.list_transactions_for_item(id, limit)).await {
        Ok(rows) => Json(rows).into_response(),
        Err(resp) => resp,
    }
}

pub(crate) async fn usage_handler(State(state): State<AppState>) -> Response {
    match with_store(&state, LedgerStore::list_usage_records).await {
        Ok(rows) => Json(rows).into_response(),
        Err(resp) => resp,
    }
}

pub(crate) async fn item_usage_handler(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Response {
    match with_store(&state, move |store| store.list_usage_records_for_item(id)).await {
        Ok(rows) => Json(rows).into_response(),
        Err(resp) => resp,
    }
}

async fn notifier_settings_body(state: &AppState) -> serde_json::Value {
    json!({
        "chat_enabled": state.settings.is_enabled().await,
        "notifier_configured": state.processor.notifier_configured(),
    })
}

pub(crate) async fn get_notifier_settings_handler(State(state): State<AppState>) -> Response {
    Json(notifier_settings_body(&state).await).into_response()
}

pub(crate) async fn set_notifier_settings_handler(
    State(state): State<AppState>,
    payload: Result<Json<NotifierToggle>, JsonRejection>,
) -> Response {
    let Json(toggle) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return validation_error(&rejection.body_text()),
    };
    if let Err(err) = state.settings.set_enabled(toggle.chat_enabled).await {
        error!(error = %err, "persisting notifier toggle failed");
        return api_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            MachineError::from_code(ErrorCode::Internal, &err.to_string()),
        );
    }
    Json(notifier_settings_body(&state).await).into_response()
}
