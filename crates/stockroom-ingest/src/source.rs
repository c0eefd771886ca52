// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use stockroom_model::SourceRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source as a whole cannot be reached or authenticated against.
    Unavailable(String),
    SectionMissing(String),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "external source unavailable: {msg}"),
            Self::SectionMissing(name) => write!(f, "external section `{name}` not found"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Named-section document provider feeding the reconciler.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    fn source_tag(&self) -> &'static str {
        "unknown"
    }

    async fn list_sections(&self) -> Result<Vec<String>, SourceError>;

    async fn read_section(&self, name: &str) -> Result<Vec<SourceRow>, SourceError>;
}
