use serde::Serialize;

use super::Stage;
use crate::catalog::{ALL_SECTIONS, SENTINEL_VALUE};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionEntry {
    pub value: String,
    pub label: String,
    pub sentinel: bool,
}

impl OptionEntry {
    fn plain(value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: value.to_string(),
            sentinel: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionSet {
    stage: Stage,
    prefix: Vec<String>,
    entries: Vec<OptionEntry>,
}

impl OptionSet {
    // An empty list still yields one selectable sentinel entry so the stage
    // never silently blocks. Non-empty section lists gain a leading "All".
    pub fn build(stage: Stage, prefix: Vec<String>, values: Vec<String>) -> Self {
        let mut entries = Vec::with_capacity(values.len() + 1);

        if values.is_empty() {
            entries.push(OptionEntry {
                value: SENTINEL_VALUE.to_string(),
                label: stage.empty_label().to_string(),
                sentinel: true,
            });
        } else {
            let has_all = values
                .iter()
                .any(|value| value.eq_ignore_ascii_case(ALL_SECTIONS));
            if stage == Stage::Section && !has_all {
                entries.push(OptionEntry::plain(ALL_SECTIONS));
            }
            entries.extend(values.iter().map(|value| OptionEntry::plain(value)));
        }

        Self {
            stage,
            prefix,
            entries,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn entries(&self) -> &[OptionEntry] {
        &self.entries
    }

    pub fn is_sentinel_only(&self) -> bool {
        self.entries.iter().all(|entry| entry.sentinel)
    }

    pub fn offers(&self, value: &str) -> bool {
        self.entries.iter().any(|entry| entry.value == value)
    }
}
