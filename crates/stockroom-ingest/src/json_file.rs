// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use stockroom_model::SourceRow;

use crate::sheets::cell_text;
use crate::{RecordSource, SourceError};

#[derive(Debug, Deserialize)]
struct SectionsDocument {
    sections: BTreeMap<String, Vec<Map<String, Value>>>,
}

/// Offline source reading `{"sections": {"Name": [{column: value}]}}`.
/// The file is re-read on every call so edits show up on the next pass.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<SectionsDocument, SourceError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            SourceError::Unavailable(format!("read {} failed: {e}", self.path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            SourceError::Unavailable(format!("parse {} failed: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    fn source_tag(&self) -> &'static str {
        "json_file"
    }

    async fn list_sections(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.load().await?.sections.into_keys().collect())
    }

    async fn read_section(&self, name: &str) -> Result<Vec<SourceRow>, SourceError> {
        let mut doc = self.load().await?;
        let rows = doc
            .sections
            .remove(name)
            .ok_or_else(|| SourceError::SectionMissing(name.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|(column, value)| (column.clone(), cell_text(value)))
                    .collect()
            })
            .collect())
    }
}
