use serde_json::{Value, json};

use crate::cascade::ResolvedTuple;
use crate::catalog::{
    ALL_SECTIONS, DOC_TYPES, LINK_RELEVANCY_TYPES, RECENCY_PERIODS, RELEVANCE_TYPES,
    STATUS_VOCABULARY, is_legislation, owned,
};
use crate::model::DocChangeResponse;

const PLACEHOLDER_CURRENT_REVISION: &str = "Rev 11";
const PLACEHOLDER_PREVIOUS_REVISION: &str = "Rev 10";

pub fn doc_types() -> Vec<String> {
    owned(&DOC_TYPES)
}

pub fn documents(doc_type: &str) -> Vec<String> {
    match doc_type.trim().to_ascii_lowercase().as_str() {
        "legislation" => owned(&["Legislation Doc A", "Legislation Doc B"]),
        "guidance" => owned(&["Guidance Doc A", "Guidance Doc B"]),
        _ => Vec::new(),
    }
}

pub fn recency_periods() -> Vec<String> {
    owned(&RECENCY_PERIODS)
}

pub fn sections(doc_type: &str, recency: &str) -> Vec<String> {
    let titles: &[&str] = if is_legislation(doc_type) {
        match recency {
            "1 month" => &["Introduction", "Scope", "Compliance"],
            "3 months" => &["Scope", "Compliance", "Penalties"],
            _ => &["Overview", "Requirements", "Definitions"],
        }
    } else {
        match recency {
            "1 month" => &["Summary", "Process", "References"],
            "6 months" => &["Process", "Examples", "Notes"],
            _ => &["Summary", "Details", "Appendix"],
        }
    };
    owned(titles)
}

pub fn relevance_types() -> Vec<String> {
    owned(&RELEVANCE_TYPES)
}

pub fn link_relevance_types() -> Vec<String> {
    owned(&LINK_RELEVANCY_TYPES)
}

pub fn link_recency_types() -> Vec<String> {
    owned(&RECENCY_PERIODS)
}

struct PlaceholderChange {
    id: u64,
    section: &'static str,
    page: u64,
    text: &'static str,
    relevance: &'static str,
    strong: &'static str,
    soft: &'static str,
    status: &'static str,
}

const PLACEHOLDER_CHANGES: [PlaceholderChange; 3] = [
    PlaceholderChange {
        id: 101,
        section: "Compliance",
        page: 12,
        text: "Updated compliance threshold from 10% to 12%.",
        relevance: "relevant",
        strong: "Threshold definition",
        soft: "Guidance summary",
        status: "Reviewed",
    },
    PlaceholderChange {
        id: 102,
        section: "Appendix A",
        page: 33,
        text: "Added appendix detailing risk assessment.",
        relevance: "maybe relevant",
        strong: "Risk register",
        soft: "Review notes",
        status: "Not Started",
    },
    PlaceholderChange {
        id: 103,
        section: "Reporting",
        page: 18,
        text: "Clarified reporting cadence to quarterly.",
        relevance: "relevant",
        strong: "Reporting schedule",
        soft: "Team comms",
        status: "Addressed",
    },
];

// Same shape the live service produces: legislation rows omit the leading
// revision-number column.
pub fn doc_changes(tuple: &ResolvedTuple) -> DocChangeResponse {
    let legislation = is_legislation(&tuple.doc_type);
    let detail_df = PLACEHOLDER_CHANGES
        .iter()
        .map(|change| {
            let mut row: Vec<Value> = Vec::with_capacity(10);
            if !legislation {
                row.push(json!("11"));
            }
            row.extend([
                json!(format!(
                    "{PLACEHOLDER_PREVIOUS_REVISION} -> {PLACEHOLDER_CURRENT_REVISION}"
                )),
                json!(change.section),
                json!(change.page),
                json!(change.text),
                json!(change.relevance),
                json!([change.strong]),
                json!([change.soft]),
                json!(change.id),
                json!(change.status),
            ]);
            row
        })
        .collect();

    let table_heading = if tuple.section.eq_ignore_ascii_case(ALL_SECTIONS) {
        "Document Changes Detailed Table".to_string()
    } else {
        format!("Section {} Changes Detailed Table", tuple.section)
    };

    DocChangeResponse {
        doc_type: tuple.doc_type.clone(),
        num_tot_changes: Some(12),
        num_sec_changes: Some(4),
        num_rel_sec_changes: Some(2),
        info: Some("block".to_string()),
        current_rev: PLACEHOLDER_CURRENT_REVISION.to_string(),
        previous_rev: PLACEHOLDER_PREVIOUS_REVISION.to_string(),
        current_rev_pdf: "placeholder/current-revision.pdf".to_string(),
        previous_rev_pdf: "placeholder/previous-revision.pdf".to_string(),
        table_heading,
        status: owned(&STATUS_VOCABULARY),
        detail_df,
    }
}
