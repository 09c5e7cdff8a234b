use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::upstream::UpstreamError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocTypesResponse {
    pub doc_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSelectResponse {
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecencySelectResponse {
    pub recency_periods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSelectResponse {
    pub secs: Value,
}

impl SectionSelectResponse {
    // `secs` arrives either as a plain list of titles or as an index-keyed
    // mapping of descriptors whose first element is the title.
    pub fn titles(&self) -> Result<Vec<String>, UpstreamError> {
        match &self.secs {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items.iter().map(section_title).collect(),
            Value::Object(map) => {
                let mut entries = map.iter().collect::<Vec<(&String, &Value)>>();
                entries.sort_by(|(left, _), (right, _)| {
                    let left_index = left.parse::<u64>().ok();
                    let right_index = right.parse::<u64>().ok();
                    left_index
                        .cmp(&right_index)
                        .then_with(|| left.cmp(right))
                });
                entries
                    .into_iter()
                    .map(|(_, descriptor)| section_title(descriptor))
                    .collect()
            }
            other => Err(UpstreamError::Decode(format!(
                "unexpected section payload: {other}"
            ))),
        }
    }
}

fn section_title(descriptor: &Value) -> Result<String, UpstreamError> {
    match descriptor {
        Value::String(title) => Ok(title.clone()),
        Value::Array(fields) => match fields.first() {
            Some(Value::String(title)) => Ok(title.clone()),
            other => Err(UpstreamError::Decode(format!(
                "section descriptor without a title: {other:?}"
            ))),
        },
        other => Err(UpstreamError::Decode(format!(
            "unexpected section descriptor: {other}"
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceSelectResponse {
    pub rel_type: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRelSelectResponse {
    pub link_rel_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecSelectResponse {
    pub recency_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocChangeResponse {
    pub doc_type: String,
    pub num_tot_changes: Option<u64>,
    pub num_sec_changes: Option<u64>,
    pub num_rel_sec_changes: Option<u64>,
    pub info: Option<String>,
    pub current_rev: String,
    pub previous_rev: String,
    pub current_rev_pdf: String,
    pub previous_rev_pdf: String,
    pub table_heading: String,
    pub status: Vec<String>,
    pub detail_df: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEntry {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveChangesResponse {
    pub success: bool,
    pub txt_msg: String,
}
