// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use stockroom_model::SourceRow;
use tracing::{debug, instrument};

use crate::{RecordSource, SourceError};

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl SheetsConfig {
    #[must_use]
    pub fn new(api_base: &str, spreadsheet_id: &str, access_token: Option<String>) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.trim().to_string(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            base_backoff_ms: 120,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Thin client over the spreadsheet values API: section listing, section
/// reads, row appends and section creation.
pub struct SheetsClient {
    config: SheetsConfig,
    http: reqwest::Client,
}

impl SheetsClient {
    #[must_use]
    pub fn new(config: SheetsConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.config.spreadsheet_id.is_empty()
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| SourceError::Unavailable(format!("invalid sheets api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SourceError::Unavailable("sheets api base cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn auth_headers(&self) -> Result<HeaderMap, SourceError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.config.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| SourceError::Unavailable(format!("invalid auth header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Sends with retry on transport errors and 5xx. `missing` names the
    /// section to report when the API answers 400/404.
    #[instrument(name = "sheets_request", skip_all, fields(method = %method, url = %url))]
    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&Value>,
        missing: Option<&str>,
    ) -> Result<Value, SourceError> {
        if !self.is_configured() {
            return Err(SourceError::Unavailable(
                "spreadsheet id is not configured".to_string(),
            ));
        }
        let headers = self.auth_headers()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers.clone())
                .query(query);
            if let Some(body) = body {
                req = req.json(body);
            }
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<Value>()
                        .await
                        .map_err(|e| SourceError::Unavailable(format!("read body failed: {e}")));
                }
                Ok(resp)
                    if matches!(resp.status(), StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND)
                        && missing.is_some() =>
                {
                    return Err(SourceError::SectionMissing(
                        missing.unwrap_or_default().to_string(),
                    ));
                }
                Ok(resp) if resp.status().is_client_error() || attempt >= self.config.max_attempts => {
                    return Err(SourceError::Unavailable(format!(
                        "sheets request failed status={}",
                        resp.status()
                    )));
                }
                Ok(resp) => {
                    debug!(status = %resp.status(), attempt, "sheets request retrying");
                }
                Err(e) => {
                    if attempt >= self.config.max_attempts {
                        return Err(SourceError::Unavailable(format!(
                            "sheets request failed: {e}"
                        )));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(
                self.config
                    .base_backoff_ms
                    .saturating_mul(attempt as u64),
            ))
            .await;
        }
    }

    pub async fn list_sections(&self) -> Result<Vec<String>, SourceError> {
        let url = self.url(&["spreadsheets", &self.config.spreadsheet_id])?;
        let doc = self
            .send(
                Method::GET,
                url,
                &[("fields", "sheets.properties.title")],
                None,
                None,
            )
            .await?;
        Ok(doc
            .get("sheets")
            .and_then(Value::as_array)
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| s.pointer("/properties/title").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn read_values(&self, section: &str) -> Result<Vec<Vec<Value>>, SourceError> {
        let range = quote_range(section);
        let url = self.url(&["spreadsheets", &self.config.spreadsheet_id, "values", &range])?;
        let doc = self
            .send(Method::GET, url, &[], None, Some(section))
            .await?;
        Ok(doc
            .get("values")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .map(|row| row.as_array().cloned().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn append_row(&self, section: &str, row: &[String]) -> Result<(), SourceError> {
        let range = format!("{}:append", quote_range(section));
        let url = self.url(&["spreadsheets", &self.config.spreadsheet_id, "values", &range])?;
        let body = json!({ "values": [row] });
        self.send(
            Method::POST,
            url,
            &[("valueInputOption", "USER_ENTERED")],
            Some(&body),
            Some(section),
        )
        .await?;
        Ok(())
    }

    pub async fn add_section(&self, title: &str) -> Result<(), SourceError> {
        let target = format!("{}:batchUpdate", self.config.spreadsheet_id);
        let url = self.url(&["spreadsheets", &target])?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.send(Method::POST, url, &[], Some(&body), None).await?;
        Ok(())
    }
}

fn quote_range(section: &str) -> String {
    format!("'{}'", section.replace('\'', "''"))
}

pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// First row is the header; later rows are keyed by it. Short rows leave
/// the trailing columns absent and fully blank rows are dropped.
#[must_use]
pub fn rows_from_values(values: &[Vec<Value>]) -> Vec<SourceRow> {
    let Some((header, body)) = values.split_first() else {
        return Vec::new();
    };
    let header: Vec<String> = header.iter().map(|h| cell_text(h).trim().to_string()).collect();
    body.iter()
        .map(|cells| {
            header
                .iter()
                .zip(cells.iter())
                .filter(|(column, _)| !column.is_empty())
                .map(|(column, cell)| (column.clone(), cell_text(cell)))
                .collect::<SourceRow>()
        })
        .filter(|row| row.values().any(|v| !v.trim().is_empty()))
        .collect()
}

/// Spreadsheet-backed record source.
pub struct SheetsSource {
    client: Arc<SheetsClient>,
}

impl SheetsSource {
    #[must_use]
    pub fn new(client: Arc<SheetsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordSource for SheetsSource {
    fn source_tag(&self) -> &'static str {
        "sheets"
    }

    async fn list_sections(&self) -> Result<Vec<String>, SourceError> {
        self.client.list_sections().await
    }

    async fn read_section(&self, name: &str) -> Result<Vec<SourceRow>, SourceError> {
        let values = self.client.read_values(name).await?;
        Ok(rows_from_values(&values))
    }
}
