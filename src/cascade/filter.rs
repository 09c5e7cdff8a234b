use serde::Serialize;

use super::{CascadeError, Stage};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    values: [Option<String>; 5],
}

impl FilterState {
    pub fn get(&self, stage: Stage) -> Option<&str> {
        self.values[stage.index()].as_deref()
    }

    pub fn is_settable(&self, stage: Stage) -> bool {
        self.missing_ancestor(stage).is_none()
    }

    fn missing_ancestor(&self, stage: Stage) -> Option<Stage> {
        stage
            .ancestors()
            .iter()
            .copied()
            .find(|ancestor| self.values[ancestor.index()].is_none())
    }

    // Setting a stage always clears every descendant, even when the value is
    // unchanged.
    pub fn with_stage(&self, stage: Stage, value: &str) -> Result<Self, CascadeError> {
        if value.trim().is_empty() {
            return Err(CascadeError::EmptyValue { stage });
        }
        if let Some(missing) = self.missing_ancestor(stage) {
            return Err(CascadeError::UnresolvedAncestor { stage, missing });
        }

        let mut next = self.clone();
        next.values[stage.index()] = Some(value.to_string());
        for descendant in stage.descendants() {
            next.values[descendant.index()] = None;
        }
        Ok(next)
    }

    // Values of every stage strictly before `stage`.
    pub fn prefix_before(&self, stage: Stage) -> Vec<String> {
        self.collect(stage.ancestors())
    }

    pub fn full_prefix(&self) -> Vec<String> {
        self.collect(&Stage::ALL)
    }

    fn collect(&self, stages: &[Stage]) -> Vec<String> {
        stages
            .iter()
            .map_while(|stage| self.values[stage.index()].clone())
            .collect()
    }

    pub fn resolved(&self) -> Option<ResolvedTuple> {
        let [doc_type, document, recency, section, relevance] = &self.values;
        Some(ResolvedTuple {
            doc_type: doc_type.clone()?,
            document: document.clone()?,
            recency: recency.clone()?,
            section: section.clone()?,
            relevance: relevance.clone()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedTuple {
    pub doc_type: String,
    pub document: String,
    pub recency: String,
    pub section: String,
    pub relevance: String,
}

impl ResolvedTuple {
    pub fn query_pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("doc_typ", self.doc_type.as_str()),
            ("docs", self.document.as_str()),
            ("recency", self.recency.as_str()),
            ("sec", self.section.as_str()),
            ("rel_type", self.relevance.as_str()),
        ]
    }
}
