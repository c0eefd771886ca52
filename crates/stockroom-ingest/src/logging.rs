// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStage {
    Fetch,
    Group,
    Merge,
    Finalize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileEvent {
    pub stage: ReconcileStage,
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone)]
pub struct ReconcileLog {
    events: Vec<ReconcileEvent>,
}

impl ReconcileLog {
    pub fn emit<const N: usize>(
        &mut self,
        stage: ReconcileStage,
        name: impl Into<String>,
        fields: [(&str, String); N],
    ) {
        self.events.push(ReconcileEvent {
            stage,
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        });
    }

    #[must_use]
    pub fn events(&self) -> &[ReconcileEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<ReconcileEvent> {
        self.events
    }
}
