// SPDX-License-Identifier: Apache-2.0

use stockroom_model::{resolve_column, SourceRow};

use crate::{RecordSource, SourceError};

pub const PERSON_NAME_COLUMNS: &[&str] = &["Nome"];
pub const CHAT_ID_COLUMNS: &[&str] = &["Slack_Username", "Slack_User_ID"];

/// Chat identity for `actor` from a people section. Names compare trimmed and
/// case-insensitively; the first matching row with an identity wins.
#[must_use]
pub fn chat_identity_from_rows(rows: &[SourceRow], actor: &str) -> Option<String> {
    let wanted = actor.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    rows.iter()
        .filter(|row| {
            resolve_column(row, PERSON_NAME_COLUMNS).is_some_and(|n| n.to_lowercase() == wanted)
        })
        .find_map(|row| resolve_column(row, CHAT_ID_COLUMNS).map(ToString::to_string))
}

/// A missing people section is not an error: it just has nobody in it.
pub async fn lookup_chat_identity(
    source: &dyn RecordSource,
    section: &str,
    actor: &str,
) -> Result<Option<String>, SourceError> {
    match source.read_section(section).await {
        Ok(rows) => Ok(chat_identity_from_rows(&rows, actor)),
        Err(SourceError::SectionMissing(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
