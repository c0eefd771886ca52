// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One spreadsheet row keyed by header text.
pub type SourceRow = BTreeMap<String, String>;

pub const NAME_COLUMNS: &[&str] = &["Nome_do_Recurso", "Nome", "Item", "nome"];
pub const CODE_COLUMNS: &[&str] = &["ID_do_Recurso", "ID"];
pub const CATEGORY_COLUMNS: &[&str] = &["Categoria"];
pub const LOCATION_COLUMNS: &[&str] = &["Localizacao_de_armazenamento", "Localização"];

/// First non-blank value among `columns`, tried in order.
#[must_use]
pub fn resolve_column<'a>(row: &'a SourceRow, columns: &[&str]) -> Option<&'a str> {
    columns
        .iter()
        .filter_map(|column| row.get(*column))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

/// A single physical unit as listed by an external section. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalRecord {
    pub name: String,
    pub code: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub origin: String,
}

impl ExternalRecord {
    /// Returns `None` for rows without a usable name.
    #[must_use]
    pub fn from_row(row: &SourceRow, origin: &str) -> Option<Self> {
        let name = resolve_column(row, NAME_COLUMNS)?;
        Some(Self {
            name: name.to_string(),
            code: resolve_column(row, CODE_COLUMNS).map(ToString::to_string),
            category: resolve_column(row, CATEGORY_COLUMNS).map(ToString::to_string),
            location: resolve_column(row, LOCATION_COLUMNS).map(ToString::to_string),
            origin: origin.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> SourceRow {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn name_resolution_follows_column_priority_and_skips_blanks() {
        let r = row(&[("Nome_do_Recurso", "  "), ("Nome", "Alicate"), ("Item", "ignored")]);
        assert_eq!(resolve_column(&r, NAME_COLUMNS), Some("Alicate"));

        let r = row(&[("nome", " Chave 10mm ")]);
        assert_eq!(resolve_column(&r, NAME_COLUMNS), Some("Chave 10mm"));
    }

    #[test]
    fn rows_without_name_produce_no_record() {
        let r = row(&[("ID", "X-1"), ("Categoria", "Ferramentas")]);
        assert!(ExternalRecord::from_row(&r, "Produto").is_none());
    }

    #[test]
    fn record_carries_optional_columns_and_origin() {
        let r = row(&[
            ("Nome_do_Recurso", "Multímetro"),
            ("ID_do_Recurso", "EL-004"),
            ("Categoria", "Medição"),
            ("Localização", "Armário 2"),
        ]);
        let rec = ExternalRecord::from_row(&r, "Eletrônica").expect("record");
        assert_eq!(rec.name, "Multímetro");
        assert_eq!(rec.code.as_deref(), Some("EL-004"));
        assert_eq!(rec.category.as_deref(), Some("Medição"));
        assert_eq!(rec.location.as_deref(), Some("Armário 2"));
        assert_eq!(rec.origin, "Eletrônica");
    }
}
