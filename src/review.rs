use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{NOTICE_DISMISS_AFTER, SAVE_FAILED_MESSAGE};
use crate::model::{SaveChangesResponse, SaveEntry};
use crate::normalize::{ChangeRow, NormalizedChanges, RowId, default_status_index};
use crate::upstream::{Backend, UpstreamError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("no change rows are loaded")]
    NoRows,

    #[error("row `{row_id}` is not in the current table")]
    UnknownRow { row_id: String },

    #[error("status `{status}` is not one of: {allowed}")]
    StatusNotInVocabulary { status: String, allowed: String },

    #[error("a save is already in flight")]
    CommitInFlight,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Saved,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct SaveNotice {
    pub kind: NoticeKind,
    pub message: String,
    #[serde(skip)]
    shown_at: Instant,
}

impl SaveNotice {
    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < NOTICE_DISMISS_AFTER
    }
}

// Rows of one resolved change set plus the status currently displayed for
// each of them. Replaced wholesale on every reload.
#[derive(Debug, Default)]
pub struct ReviewTable {
    rows: Vec<ChangeRow>,
    vocabulary: Vec<String>,
    edits: HashMap<RowId, String>,
    in_flight: bool,
    notice: Option<SaveNotice>,
}

impl ReviewTable {
    pub fn load(&mut self, changes: &NormalizedChanges) {
        self.vocabulary = changes.vocabulary.clone();
        self.rows = changes.rows.clone();
        self.edits = self
            .rows
            .iter()
            .map(|row| {
                let seeded = default_status_index(&self.vocabulary, &row.status)
                    .map(|index| self.vocabulary[index].clone())
                    .unwrap_or_else(|| row.status.clone());
                (row.row_id.clone(), seeded)
            })
            .collect();
        self.notice = None;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.vocabulary.clear();
        self.edits.clear();
        self.notice = None;
    }

    pub fn rows(&self) -> &[ChangeRow] {
        &self.rows
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn status_of(&self, row_id: &str) -> Option<&str> {
        self.edits.get(&RowId::new(row_id)).map(String::as_str)
    }

    // Vocabulary index the status control should show for a row.
    pub fn selected_index(&self, row_id: &str) -> Option<usize> {
        self.status_of(row_id)
            .and_then(|status| default_status_index(&self.vocabulary, status))
    }

    pub fn set_status(&mut self, row_id: &str, status: &str) -> Result<(), ReviewError> {
        let key = RowId::new(row_id.trim());
        if !self.edits.contains_key(&key) {
            return Err(ReviewError::UnknownRow {
                row_id: row_id.to_string(),
            });
        }

        let canonical = self
            .vocabulary
            .iter()
            .find(|option| option.eq_ignore_ascii_case(status.trim()))
            .cloned()
            .ok_or_else(|| ReviewError::StatusNotInVocabulary {
                status: status.to_string(),
                allowed: self.vocabulary.join(", "),
            })?;

        self.edits.insert(key, canonical);
        Ok(())
    }

    // Every displayed row, in table order, whether or not it was edited.
    pub fn pending_batch(&self) -> Vec<SaveEntry> {
        self.rows
            .iter()
            .filter_map(|row| {
                self.edits.get(&row.row_id).map(|status| SaveEntry {
                    id: row.row_id.to_string(),
                    value: status.clone(),
                })
            })
            .collect()
    }

    pub fn begin_commit(&mut self) -> Result<Vec<SaveEntry>, ReviewError> {
        if self.in_flight {
            return Err(ReviewError::CommitInFlight);
        }
        if self.rows.is_empty() {
            return Err(ReviewError::NoRows);
        }
        self.in_flight = true;
        Ok(self.pending_batch())
    }

    pub fn finish_commit(
        &mut self,
        result: Result<SaveChangesResponse, UpstreamError>,
        now: Instant,
    ) -> &SaveNotice {
        self.in_flight = false;

        let (kind, message) = match result {
            Ok(response) if response.success => {
                info!(rows = self.rows.len(), "status batch saved");
                (NoticeKind::Saved, response.txt_msg)
            }
            Ok(response) => {
                warn!(message = %response.txt_msg, "status batch rejected");
                (NoticeKind::Failed, response.txt_msg)
            }
            Err(err) => {
                warn!(error = %err, "status batch could not be sent");
                (NoticeKind::Failed, SAVE_FAILED_MESSAGE.to_string())
            }
        };

        self.notice.insert(SaveNotice {
            kind,
            message,
            shown_at: now,
        })
    }

    pub async fn commit(&mut self, backend: &dyn Backend) -> Result<&SaveNotice, ReviewError> {
        let batch = self.begin_commit()?;
        let result = backend.save_changes(&batch).await;
        Ok(self.finish_commit(result, Instant::now()))
    }

    pub fn notice(&self, now: Instant) -> Option<&SaveNotice> {
        self.notice.as_ref().filter(|notice| notice.is_visible(now))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::model::DocChangeResponse;
    use crate::normalize::normalize_payload;
    use crate::upstream::FallbackBackend;
    use crate::upstream::testing::ScriptedUpstream;

    fn changes() -> NormalizedChanges {
        let row = |id: u64, status: &str| {
            json!(["2024-06-01", "Scope", 4, "text", "relevant", [], [], id, status])
                .as_array()
                .cloned()
                .unwrap()
        };
        let payload = DocChangeResponse {
            doc_type: "Legislation".to_string(),
            status: vec![
                "Not Started".to_string(),
                "Reviewed".to_string(),
                "Addressed".to_string(),
            ],
            detail_df: vec![row(41, "reviewed"), row(42, "Not Started"), row(43, "addressed")],
            ..DocChangeResponse::default()
        };
        normalize_payload(&payload).unwrap()
    }

    fn loaded() -> ReviewTable {
        let mut table = ReviewTable::default();
        table.load(&changes());
        table
    }

    #[test]
    fn edits_are_seeded_with_the_canonical_vocabulary_spelling() {
        let table = loaded();
        assert_eq!(table.status_of("41"), Some("Reviewed"));
        assert_eq!(table.selected_index("41"), Some(1));
        assert_eq!(table.selected_index("43"), Some(2));
    }

    #[test]
    fn commit_batch_carries_every_displayed_row() {
        let mut table = loaded();
        table.set_status("42", "addressed").unwrap();

        let batch = table.begin_commit().unwrap();
        assert_eq!(
            batch,
            vec![
                SaveEntry {
                    id: "41".to_string(),
                    value: "Reviewed".to_string(),
                },
                SaveEntry {
                    id: "42".to_string(),
                    value: "Addressed".to_string(),
                },
                SaveEntry {
                    id: "43".to_string(),
                    value: "Addressed".to_string(),
                },
            ]
        );
    }

    #[test]
    fn later_edits_overwrite_earlier_ones() {
        let mut table = loaded();
        table.set_status("42", "Reviewed").unwrap();
        table.set_status("42", "Not Started").unwrap();
        assert_eq!(table.status_of("42"), Some("Not Started"));
    }

    #[test]
    fn rejects_unknown_rows_and_statuses() {
        let mut table = loaded();
        assert!(matches!(
            table.set_status("99", "Reviewed"),
            Err(ReviewError::UnknownRow { .. })
        ));
        assert!(matches!(
            table.set_status("42", "Escalated"),
            Err(ReviewError::StatusNotInVocabulary { .. })
        ));
        assert_eq!(table.status_of("42"), Some("Not Started"));
    }

    #[test]
    fn double_submission_is_refused_until_the_first_resolves() {
        let mut table = loaded();
        table.begin_commit().unwrap();
        assert_eq!(table.begin_commit(), Err(ReviewError::CommitInFlight));

        table.finish_commit(
            Ok(SaveChangesResponse {
                success: true,
                txt_msg: "ok".to_string(),
            }),
            Instant::now(),
        );
        assert!(table.begin_commit().is_ok());
    }

    #[test]
    fn empty_table_has_nothing_to_commit() {
        let mut table = ReviewTable::default();
        assert_eq!(table.begin_commit(), Err(ReviewError::NoRows));
    }

    #[test]
    fn notices_dismiss_after_thirty_seconds() {
        let mut table = loaded();
        let shown = Instant::now();
        table.begin_commit().unwrap();
        table.finish_commit(
            Ok(SaveChangesResponse {
                success: false,
                txt_msg: "rejected".to_string(),
            }),
            shown,
        );

        let notice = table.notice(shown + Duration::from_secs(29)).unwrap();
        assert_eq!(notice.kind, NoticeKind::Failed);
        assert!(table.notice(shown + Duration::from_secs(30)).is_none());
    }

    #[test]
    fn reloading_the_table_drops_the_previous_notice() {
        let mut table = loaded();
        let shown = Instant::now();
        table.begin_commit().unwrap();
        table.finish_commit(
            Ok(SaveChangesResponse {
                success: true,
                txt_msg: "saved".to_string(),
            }),
            shown,
        );
        assert!(table.notice(shown).is_some());

        table.clear();
        assert!(table.notice(shown).is_none());

        table.begin_commit().unwrap_err();
        table.load(&changes());
        table.begin_commit().unwrap();
        table.finish_commit(
            Ok(SaveChangesResponse {
                success: true,
                txt_msg: "saved".to_string(),
            }),
            shown,
        );
        table.load(&changes());
        assert!(table.notice(shown).is_none());
    }

    #[tokio::test]
    async fn successful_commit_reports_the_server_message() {
        let upstream = ScriptedUpstream::default();
        let saved = upstream.saved();
        let backend = FallbackBackend::new(Box::new(upstream));

        let mut table = loaded();
        table.set_status("42", "Addressed").unwrap();
        let notice = table.commit(&backend).await.unwrap();

        assert_eq!(notice.kind, NoticeKind::Saved);
        assert!(notice.message.starts_with("Your changes have been saved at"));
        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].contains(&SaveEntry {
            id: "42".to_string(),
            value: "Addressed".to_string(),
        }));
    }

    #[tokio::test]
    async fn failed_commit_keeps_edits_for_retry() {
        let backend: Arc<dyn Backend> = Arc::new(FallbackBackend::new(Box::new(
            ScriptedUpstream::default().with_failing_save(),
        )));

        let mut table = loaded();
        table.set_status("42", "Reviewed").unwrap();
        let notice = table.commit(backend.as_ref()).await.unwrap();

        assert_eq!(notice.kind, NoticeKind::Failed);
        assert_eq!(notice.message, SAVE_FAILED_MESSAGE);
        assert_eq!(table.status_of("42"), Some("Reviewed"));
        assert!(table.begin_commit().is_ok());
    }
}
