use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::catalog::{STATUS_VOCABULARY, owned};
use crate::model::DocChangeResponse;


const LINK_SEPARATOR: &str = "<br>";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relevance {
    Relevant,
    MaybeRelevant,
    NotRelevant,
}

impl Relevance {
    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "relevant" | "1" | "1.0" => Some(Self::Relevant),
            "maybe" | "maybe relevant" | "0.5" => Some(Self::MaybeRelevant),
            "not relevant" | "0" | "0.0" => Some(Self::NotRelevant),
            _ => None,
        }
    }

    pub fn from_prediction(prediction: f64) -> Option<Self> {
        if prediction == 1.0 {
            Some(Self::Relevant)
        } else if prediction == 0.5 {
            Some(Self::MaybeRelevant)
        } else if prediction == 0.0 {
            Some(Self::NotRelevant)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relevant => "relevant",
            Self::MaybeRelevant => "maybe relevant",
            Self::NotRelevant => "not relevant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRow {
    pub row_id: RowId,
    pub revision_number: Option<String>,
    pub revision_label: String,
    pub section_title: String,
    pub page_number: String,
    pub change_text: String,
    pub relevance: Relevance,
    pub strong_links: Vec<String>,
    pub soft_links: Vec<String>,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSessionMetrics {
    pub total_changes: Option<u64>,
    pub section_changes: Option<u64>,
    pub relevant_section_changes: Option<u64>,
    pub current_revision: String,
    pub previous_revision: String,
    pub current_revision_ref: String,
    pub previous_revision_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedChanges {
    pub doc_type: String,
    pub table_heading: String,
    pub metrics: ReviewSessionMetrics,
    pub vocabulary: Vec<String>,
    pub rows: Vec<ChangeRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("row {index} has {arity} columns; expected 8, 9 or 10")]
    UnsupportedArity { index: usize, arity: usize },

    #[error("row {index} column `{field}` is invalid: {reason}")]
    InvalidField {
        index: usize,
        field: &'static str,
        reason: String,
    },

    #[error("row {index} has unknown relevance `{value}`")]
    UnknownRelevance { index: usize, value: String },

    #[error("row id `{row_id}` appears more than once")]
    DuplicateRowId { row_id: String },
}

// The only place column positions are interpreted. Every shape ends with
// `rowId, status`; what precedes them depends on arity alone.
enum RawRow<'a> {
    Revisioned(&'a [Value; 10]),
    Generic(&'a [Value; 9]),
    Compact(&'a [Value; 8]),
}

impl<'a> RawRow<'a> {
    fn classify(index: usize, cells: &'a [Value]) -> Result<Self, NormalizeError> {
        if let Ok(cells) = <&[Value; 10]>::try_from(cells) {
            return Ok(Self::Revisioned(cells));
        }
        if let Ok(cells) = <&[Value; 9]>::try_from(cells) {
            return Ok(Self::Generic(cells));
        }
        if let Ok(cells) = <&[Value; 8]>::try_from(cells) {
            return Ok(Self::Compact(cells));
        }
        Err(NormalizeError::UnsupportedArity {
            index,
            arity: cells.len(),
        })
    }

    fn decode(self, index: usize, current_revision: &str) -> Result<ChangeRow, NormalizeError> {
        let field = FieldReader { index };
        match self {
            Self::Revisioned(
                [
                    revision_number,
                    revision,
                    section,
                    page,
                    text,
                    relevance,
                    strong,
                    soft,
                    row_id,
                    status,
                ],
            ) => Ok(ChangeRow {
                row_id: field.row_id(row_id)?,
                revision_number: Some(field.text(revision_number, "revisionNumber")?),
                revision_label: field.text(revision, "revision")?,
                section_title: field.text(section, "sectionTitle")?,
                page_number: field.text(page, "pageNumber")?,
                change_text: field.text(text, "changeText")?,
                relevance: field.relevance(relevance)?,
                strong_links: field.links(strong, "strongLinks")?,
                soft_links: field.links(soft, "softLinks")?,
                status: field.status(status)?,
            }),
            Self::Generic(
                [
                    revision,
                    section,
                    page,
                    text,
                    relevance,
                    strong,
                    soft,
                    row_id,
                    status,
                ],
            ) => Ok(ChangeRow {
                row_id: field.row_id(row_id)?,
                revision_number: None,
                revision_label: field.text(revision, "revision")?,
                section_title: field.text(section, "sectionTitle")?,
                page_number: field.text(page, "pageNumber")?,
                change_text: field.text(text, "changeText")?,
                relevance: field.relevance(relevance)?,
                strong_links: field.links(strong, "strongLinks")?,
                soft_links: field.links(soft, "softLinks")?,
                status: field.status(status)?,
            }),
            Self::Compact([section, page, text, relevance, strong, soft, row_id, status]) => {
                Ok(ChangeRow {
                    row_id: field.row_id(row_id)?,
                    revision_number: None,
                    revision_label: current_revision.to_string(),
                    section_title: field.text(section, "sectionTitle")?,
                    page_number: field.text(page, "pageNumber")?,
                    change_text: field.text(text, "changeText")?,
                    relevance: field.relevance(relevance)?,
                    strong_links: field.links(strong, "strongLinks")?,
                    soft_links: field.links(soft, "softLinks")?,
                    status: field.status(status)?,
                })
            }
        }
    }
}

struct FieldReader {
    index: usize,
}

impl FieldReader {
    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> NormalizeError {
        NormalizeError::InvalidField {
            index: self.index,
            field,
            reason: reason.into(),
        }
    }

    fn text(&self, value: &Value, field: &'static str) -> Result<String, NormalizeError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) => Ok(render_number(number)),
            other => Err(self.invalid(field, format!("expected text, found {other}"))),
        }
    }

    fn row_id(&self, value: &Value) -> Result<RowId, NormalizeError> {
        let raw = self.text(value, "rowId")?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(self.invalid("rowId", "row id is empty"));
        }
        Ok(RowId::new(trimmed))
    }

    fn status(&self, value: &Value) -> Result<String, NormalizeError> {
        match value {
            Value::String(status) => Ok(status.clone()),
            other => Err(self.invalid("status", format!("expected text, found {other}"))),
        }
    }

    fn relevance(&self, value: &Value) -> Result<Relevance, NormalizeError> {
        let parsed = match value {
            Value::String(label) => Relevance::parse_label(label),
            Value::Number(number) => number.as_f64().and_then(Relevance::from_prediction),
            _ => None,
        };
        parsed.ok_or_else(|| NormalizeError::UnknownRelevance {
            index: self.index,
            value: value.to_string(),
        })
    }

    fn links(&self, value: &Value, field: &'static str) -> Result<Vec<String>, NormalizeError> {
        match value {
            Value::Null => Ok(Vec::new()),
            // The live service joins a row's links into one `<br>`-separated string.
            Value::String(joined) => Ok(joined
                .split(LINK_SEPARATOR)
                .map(str::trim)
                .filter(|link| !link.is_empty())
                .map(str::to_string)
                .collect()),
            Value::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| self.text(item, field))
                .collect(),
            other => Err(self.invalid(field, format!("expected a link list, found {other}"))),
        }
    }
}

fn render_number(number: &serde_json::Number) -> String {
    if let Some(integer) = number.as_i64() {
        return integer.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => format!("{}", float as i64),
        _ => number.to_string(),
    }
}

pub fn normalize_rows(
    rows: &[Vec<Value>],
    current_revision: &str,
) -> Result<Vec<ChangeRow>, NormalizeError> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut normalized = Vec::with_capacity(rows.len());

    for (index, cells) in rows.iter().enumerate() {
        let row = RawRow::classify(index, cells)?.decode(index, current_revision)?;
        if !seen.insert(row.row_id.clone()) {
            return Err(NormalizeError::DuplicateRowId {
                row_id: row.row_id.to_string(),
            });
        }
        normalized.push(row);
    }

    Ok(normalized)
}

pub fn normalize_payload(payload: &DocChangeResponse) -> Result<NormalizedChanges, NormalizeError> {
    let rows = normalize_rows(&payload.detail_df, &payload.current_rev)?;

    let vocabulary = if payload.status.is_empty() {
        warn!(
            doc_type = %payload.doc_type,
            "payload carried no status vocabulary; using the default set"
        );
        owned(&STATUS_VOCABULARY)
    } else {
        payload.status.clone()
    };

    Ok(NormalizedChanges {
        doc_type: payload.doc_type.clone(),
        table_heading: payload.table_heading.clone(),
        metrics: ReviewSessionMetrics {
            total_changes: payload.num_tot_changes,
            section_changes: payload.num_sec_changes,
            relevant_section_changes: payload.num_rel_sec_changes,
            current_revision: payload.current_rev.clone(),
            previous_revision: payload.previous_rev.clone(),
            current_revision_ref: payload.current_rev_pdf.clone(),
            previous_revision_ref: payload.previous_rev_pdf.clone(),
        },
        vocabulary,
        rows,
    })
}

// Index of the vocabulary entry pre-selected for `status`. Malformed data
// (no match, or several case-insensitive matches) falls back to the first
// match and is logged.
pub fn default_status_index(vocabulary: &[String], status: &str) -> Option<usize> {
    let mut matches = vocabulary
        .iter()
        .enumerate()
        .filter(|(_, option)| option.eq_ignore_ascii_case(status.trim()))
        .map(|(index, _)| index);

    let first = matches.next();
    let extra = matches.count();

    match first {
        None => warn!(status, "status does not match any vocabulary option"),
        Some(_) if extra > 0 => warn!(
            status,
            matches = extra + 1,
            "status matches several vocabulary options"
        ),
        Some(_) => {}
    }

    first
}
