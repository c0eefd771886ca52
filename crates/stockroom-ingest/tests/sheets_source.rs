// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use stockroom_ingest::{
    lookup_chat_identity, RecordSource, SheetsClient, SheetsConfig, SheetsSource, SourceError,
};

#[derive(Clone, Default)]
struct Sheet {
    appended: Arc<Mutex<Vec<(String, Value)>>>,
    created: Arc<Mutex<Vec<String>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer test-token")
}

async fn spreadsheet(
    State(_sheet): State<Sheet>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})));
    }
    assert_eq!(id, "sheet-1");
    (
        StatusCode::OK,
        Json(json!({"sheets": [
            {"properties": {"title": "Mecânica"}},
            {"properties": {"title": "PESSOAS"}}
        ]})),
    )
}

async fn batch_update(
    State(sheet): State<Sheet>,
    Path(target): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert_eq!(target, "sheet-1:batchUpdate");
    let title = body
        .pointer("/requests/0/addSheet/properties/title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    sheet.created.lock().expect("lock").push(title);
    (StatusCode::OK, Json(json!({})))
}

async fn values(Path((_id, range)): Path<(String, String)>) -> (StatusCode, Json<Value>) {
    match range.as_str() {
        "'Mecânica'" => (
            StatusCode::OK,
            Json(json!({"values": [
                ["Nome_do_Recurso", "ID_do_Recurso", "Categoria"],
                ["Torquímetro", "M-1", "Ferramentas"],
                ["Torquímetro", "M-2"]
            ]})),
        ),
        "'PESSOAS'" => (
            StatusCode::OK,
            Json(json!({"values": [
                ["Nome", "Slack_Username", "Slack_User_ID"],
                ["Ana Souza", "", "U0001"]
            ]})),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "Unable to parse range"}})),
        ),
    }
}

async fn append(
    State(sheet): State<Sheet>,
    Path((_id, range)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(section) = range.strip_suffix(":append") else {
        return (StatusCode::BAD_REQUEST, Json(json!({})));
    };
    if section != "'HISTÓRICO'" || sheet.created.lock().expect("lock").is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({})));
    }
    sheet
        .appended
        .lock()
        .expect("lock")
        .push((section.to_string(), body));
    (StatusCode::OK, Json(json!({"updates": {"updatedRows": 1}})))
}

async fn serve(sheet: Sheet) -> String {
    let app = Router::new()
        .route("/v4/spreadsheets/:id", get(spreadsheet).post(batch_update))
        .route("/v4/spreadsheets/:id/values/:range", get(values).post(append))
        .with_state(sheet);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/v4")
}

fn client(base: &str, token: Option<&str>) -> Arc<SheetsClient> {
    Arc::new(SheetsClient::new(SheetsConfig::new(
        base,
        "sheet-1",
        token.map(ToString::to_string),
    )))
}

#[tokio::test]
async fn sheets_source_lists_and_reads_sections() {
    let base = serve(Sheet::default()).await;
    let source = SheetsSource::new(client(&base, Some("test-token")));

    let sections = source.list_sections().await.expect("sections");
    assert_eq!(sections, vec!["Mecânica", "PESSOAS"]);

    let rows = source.read_section("Mecânica").await.expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[1].get("ID_do_Recurso").map(String::as_str),
        Some("M-2")
    );
    assert!(rows[1].get("Categoria").is_none());

    let missing = source.read_section("Produto").await.expect_err("missing");
    assert_eq!(missing, SourceError::SectionMissing("Produto".to_string()));

    let who = lookup_chat_identity(&source, "PESSOAS", "ana souza")
        .await
        .expect("people");
    assert_eq!(who.as_deref(), Some("U0001"));
}

#[tokio::test]
async fn rejected_credentials_make_the_source_unavailable() {
    let base = serve(Sheet::default()).await;
    let source = SheetsSource::new(client(&base, Some("wrong")));
    let err = source.list_sections().await.expect_err("unauthorized");
    assert!(matches!(err, SourceError::Unavailable(_)));

    let unconfigured = SheetsClient::new(SheetsConfig::new(&base, "  ", None));
    assert!(!unconfigured.is_configured());
    assert!(matches!(
        unconfigured.list_sections().await,
        Err(SourceError::Unavailable(_))
    ));
}

#[tokio::test]
async fn append_reports_missing_section_until_it_is_created() {
    let sheet = Sheet::default();
    let base = serve(sheet.clone()).await;
    let client = client(&base, Some("test-token"));
    let row = vec!["2026-03-02 09:00:00".to_string(), "RETIRADA".to_string()];

    let err = client.append_row("HISTÓRICO", &row).await.expect_err("missing");
    assert_eq!(err, SourceError::SectionMissing("HISTÓRICO".to_string()));

    client.add_section("HISTÓRICO").await.expect("create");
    client.append_row("HISTÓRICO", &row).await.expect("append");

    let appended = sheet.appended.lock().expect("lock");
    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].1, json!({"values": [row]}));
}
