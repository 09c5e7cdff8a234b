use std::time::Duration;

pub const LEGISLATION: &str = "Legislation";

pub const DOC_TYPES: [&str; 2] = [LEGISLATION, "Guidance"];

pub const RELEVANCE_TYPES: [&str; 4] = ["not relevant", "relevant", "maybe relevant", "all"];

pub const RECENCY_PERIODS: [&str; 6] = [
    "1 month",
    "3 months",
    "6 months",
    "1 year",
    "2 years",
    "Historical",
];

pub const LINK_RELEVANCY_TYPES: [&str; 2] = ["Strong", "Soft"];

pub const STATUS_VOCABULARY: [&str; 4] = ["Not Started", "Reviewed", "Addressed", "Not Relevant"];

pub const ALL_SECTIONS: &str = "All";

pub const NO_SECTIONS_AVAILABLE: &str = "No sections available for this period";

pub const NO_OPTIONS_AVAILABLE: &str = "No options available";

pub const SENTINEL_VALUE: &str = "-";

pub const SAVE_FAILED_MESSAGE: &str =
    "There was an error connecting to the database, the current selections have not been saved.";

pub const NOTICE_DISMISS_AFTER: Duration = Duration::from_secs(30);

pub const REVISION_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn is_legislation(doc_type: &str) -> bool {
    doc_type.trim().eq_ignore_ascii_case(LEGISLATION)
}

pub fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
