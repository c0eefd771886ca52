// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::collections::BTreeMap;
use stockroom_model::SourceRow;

use crate::{RecordSource, SourceError};

/// In-memory source for tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    sections: BTreeMap<String, Vec<SourceRow>>,
    unavailable: Option<String>,
}

impl StaticSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every call with `SourceError::Unavailable`.
    #[must_use]
    pub fn unavailable(reason: &str) -> Self {
        Self {
            sections: BTreeMap::new(),
            unavailable: Some(reason.to_string()),
        }
    }

    #[must_use]
    pub fn with_section(mut self, name: &str, rows: Vec<SourceRow>) -> Self {
        self.sections.insert(name.to_string(), rows);
        self
    }

    /// Rows given as `(column, value)` pairs.
    #[must_use]
    pub fn with_rows(self, name: &str, rows: &[&[(&str, &str)]]) -> Self {
        let rows = rows
            .iter()
            .map(|pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect()
            })
            .collect();
        self.with_section(name, rows)
    }

    fn check(&self) -> Result<(), SourceError> {
        match &self.unavailable {
            Some(reason) => Err(SourceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn source_tag(&self) -> &'static str {
        "static"
    }

    async fn list_sections(&self) -> Result<Vec<String>, SourceError> {
        self.check()?;
        Ok(self.sections.keys().cloned().collect())
    }

    async fn read_section(&self, name: &str) -> Result<Vec<SourceRow>, SourceError> {
        self.check()?;
        self.sections
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::SectionMissing(name.to_string()))
    }
}
