use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{Upstream, UpstreamError};
use crate::cascade::ResolvedTuple;
use crate::catalog::{
    ALL_SECTIONS, DOC_TYPES, LINK_RELEVANCY_TYPES, RECENCY_PERIODS, RELEVANCE_TYPES,
    REVISION_DATE_FORMAT, SAVE_FAILED_MESSAGE, STATUS_VOCABULARY, is_legislation, owned,
};
use crate::model::{DocChangeResponse, SaveChangesResponse, SaveEntry};
use crate::normalize::Relevance;
use crate::util::{self, DocumentNameCleaner, parse_revision_date, recency_cutoff};

const GOV: &str = "gov";
const NON_GOV: &str = "non-gov";

const STATUS_SQL: &str = "
    CASE
      WHEN validated_not_relevant = 1 THEN 'not relevant'
      WHEN addressed = 1 THEN 'addressed'
      WHEN reviewed = 1 THEN 'reviewed'
      ELSE 'not started'
    END";

// One exported change record, using the column names of the change-detection
// export.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(rename = "ID")]
    pub id: i64,
    pub document_name: String,
    pub document_type: String,
    #[serde(default)]
    pub revision_number: Option<String>,
    #[serde(default)]
    pub prev_revision_number: Option<String>,
    pub current_revision: String,
    #[serde(default)]
    pub previous_revision: Option<String>,
    pub section_title: String,
    #[serde(default)]
    pub page_number: Option<i64>,
    pub change_text: String,
    #[serde(default)]
    pub previous_paragraph: Option<String>,
    #[serde(default)]
    pub next_paragraph: Option<String>,
    #[serde(rename = "rel_model_pred")]
    pub rel_model_pred: f64,
    #[serde(default)]
    pub strong_links: Vec<String>,
    #[serde(default)]
    pub soft_links: Vec<String>,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub addressed: bool,
    #[serde(default)]
    pub validated_not_relevant: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BacklogStats {
    pub not_started: u64,
    pub reviewed: u64,
    pub addressed: u64,
}

#[derive(Debug, Clone)]
struct StoredChange {
    id: i64,
    revision_number: String,
    prev_revision_number: String,
    current_revision: String,
    previous_revision: String,
    section_title: String,
    page_number: Option<i64>,
    change_text: String,
    rel_model_pred: f64,
    strong_links: String,
    soft_links: String,
    status: String,
}

impl StoredChange {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            revision_number: row.get(1)?,
            prev_revision_number: row.get(2)?,
            current_revision: row.get(3)?,
            previous_revision: row.get(4)?,
            section_title: row.get(5)?,
            page_number: row.get(6)?,
            change_text: row.get(7)?,
            rel_model_pred: row.get(8)?,
            strong_links: row.get(9)?,
            soft_links: row.get(10)?,
            status: row.get(11)?,
        })
    }

    fn relevance(&self) -> Relevance {
        Relevance::from_prediction(self.rel_model_pred).unwrap_or(Relevance::NotRelevant)
    }

    fn matches_relevance(&self, rel_type: &str) -> bool {
        let not_relevant = self.status == "not relevant";
        match rel_type.trim().to_ascii_lowercase().as_str() {
            "relevant" => self.rel_model_pred == 1.0 && !not_relevant,
            "maybe relevant" => self.rel_model_pred == 0.5 && !not_relevant,
            "not relevant" => self.rel_model_pred == 0.0 || not_relevant,
            _ => true,
        }
    }

    // Links are only shown for changes predicted at least maybe relevant.
    fn links(&self, raw: &str) -> Vec<String> {
        if self.rel_model_pred < 0.5 {
            return Vec::new();
        }
        match serde_json::from_str(raw) {
            Ok(links) => links,
            Err(err) => {
                warn!(id = self.id, error = %err, "stored link list is not valid json");
                Vec::new()
            }
        }
    }

    fn detail_row(&self, with_revision_number: bool) -> Vec<Value> {
        let mut row = Vec::with_capacity(10);
        if with_revision_number {
            row.push(json!(self.revision_number));
        }
        row.extend([
            json!(self.current_revision),
            json!(self.section_title),
            self.page_number.map_or_else(|| json!(""), |page| json!(page)),
            json!(self.change_text),
            json!(self.relevance().as_str()),
            json!(self.links(&self.strong_links)),
            json!(self.links(&self.soft_links)),
            json!(self.id),
            json!(self.status),
        ]);
        row
    }
}

pub struct LocalUpstream {
    connection: Mutex<Connection>,
    reference_date: Option<NaiveDate>,
    cleaner: DocumentNameCleaner,
}

impl LocalUpstream {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        configure_connection(&connection)?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        ensure_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            reference_date: None,
            cleaner: DocumentNameCleaner::new()?,
        })
    }

    // Pins "now" for recency windows.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(util::today)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, UpstreamError> {
        self.connection
            .lock()
            .map_err(|_| UpstreamError::Store("connection lock poisoned".to_string()))
    }

    pub fn ingest(&self, records: &[ChangeRecord]) -> Result<usize> {
        let mut connection = self
            .lock()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
        let tx = connection.transaction()?;

        for record in records {
            let document_type = match record.document_type.trim().to_ascii_lowercase().as_str() {
                GOV => GOV,
                NON_GOV => NON_GOV,
                other => bail!("change {} has unsupported document type '{other}'", record.id),
            };
            if Relevance::from_prediction(record.rel_model_pred).is_none() {
                bail!(
                    "change {} has unsupported relevance prediction {}",
                    record.id,
                    record.rel_model_pred
                );
            }
            let current_revision = parse_revision_date(&record.current_revision)
                .with_context(|| format!("change {} has an invalid current revision", record.id))?
                .format(REVISION_DATE_FORMAT)
                .to_string();
            let previous_revision = match record.previous_revision.as_deref() {
                Some(raw) if !raw.trim().is_empty() => parse_revision_date(raw)
                    .with_context(|| {
                        format!("change {} has an invalid previous revision", record.id)
                    })?
                    .format(REVISION_DATE_FORMAT)
                    .to_string(),
                _ => String::new(),
            };

            tx.execute(
                "
                INSERT OR REPLACE INTO changes (
                  id, document_name, document_type, revision_number, prev_revision_number,
                  current_revision, previous_revision, section_title, page_number, change_text,
                  rel_model_pred, strong_links, soft_links, reviewed, addressed,
                  validated_not_relevant
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ",
                params![
                    record.id,
                    self.cleaner.clean(&record.document_name),
                    document_type,
                    record.revision_number.as_deref().unwrap_or("").trim(),
                    record.prev_revision_number.as_deref().unwrap_or("").trim(),
                    current_revision,
                    previous_revision,
                    record.section_title.trim(),
                    record.page_number,
                    change_context(
                        &record.change_text,
                        record.previous_paragraph.as_deref(),
                        record.next_paragraph.as_deref(),
                    ),
                    record.rel_model_pred,
                    serde_json::to_string(&record.strong_links)?,
                    serde_json::to_string(&record.soft_links)?,
                    record.reviewed,
                    record.addressed,
                    record.validated_not_relevant,
                ],
            )?;
        }

        tx.commit()?;
        info!(records = records.len(), "ingested change records");
        Ok(records.len())
    }

    pub fn backlog_stats(&self, since: NaiveDate) -> Result<BacklogStats> {
        let connection = self
            .lock()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
        let since = since.format(REVISION_DATE_FORMAT).to_string();
        let sql = format!(
            "SELECT {STATUS_SQL} AS status, COUNT(*) FROM changes
             WHERE current_revision >= ?1 GROUP BY status"
        );

        let mut stats = BacklogStats::default();
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map(params![since], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            let count = u64::try_from(count).unwrap_or_default();
            match status.as_str() {
                "not started" => stats.not_started = count,
                "reviewed" => stats.reviewed = count,
                "addressed" => stats.addressed = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    fn document_changes(
        &self,
        doc_type: &str,
        document: &str,
    ) -> Result<Vec<StoredChange>, UpstreamError> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT id, revision_number, prev_revision_number, current_revision,
                    previous_revision, section_title, page_number, change_text,
                    rel_model_pred, strong_links, soft_links, {STATUS_SQL}
             FROM changes
             WHERE document_type = ?1 AND document_name = ?2
             ORDER BY rowid"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(params![folder(doc_type), document], StoredChange::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn within_recency(
        &self,
        changes: Vec<StoredChange>,
        recency: &str,
    ) -> Result<Vec<StoredChange>, UpstreamError> {
        let cutoff = recency_cutoff(recency, self.today())
            .map_err(|err| UpstreamError::InvalidQuery(err.to_string()))?;
        Ok(match cutoff {
            None => changes,
            Some(cutoff) => {
                let cutoff = cutoff.format(REVISION_DATE_FORMAT).to_string();
                changes
                    .into_iter()
                    .filter(|change| change.current_revision > cutoff)
                    .collect()
            }
        })
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS changes (
              id INTEGER PRIMARY KEY,
              document_name TEXT NOT NULL,
              document_type TEXT NOT NULL,
              revision_number TEXT NOT NULL DEFAULT '',
              prev_revision_number TEXT NOT NULL DEFAULT '',
              current_revision TEXT NOT NULL,
              previous_revision TEXT NOT NULL DEFAULT '',
              section_title TEXT NOT NULL,
              page_number INTEGER,
              change_text TEXT NOT NULL,
              rel_model_pred REAL NOT NULL,
              strong_links TEXT NOT NULL DEFAULT '[]',
              soft_links TEXT NOT NULL DEFAULT '[]',
              reviewed INTEGER NOT NULL DEFAULT 0,
              addressed INTEGER NOT NULL DEFAULT 0,
              validated_not_relevant INTEGER NOT NULL DEFAULT 0,
              last_submit TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_changes_document
              ON changes(document_type, document_name);
            ",
        )
        .context("failed to create changes schema")?;
    Ok(())
}

fn folder(doc_type: &str) -> &'static str {
    if is_legislation(doc_type) { GOV } else { NON_GOV }
}

fn change_context(change: &str, previous: Option<&str>, next: Option<&str>) -> String {
    if previous.is_none() && next.is_none() {
        return change.trim().to_string();
    }
    format!(
        "Previous: {}\nChange: {}\nNext: {}",
        previous.unwrap_or_default().trim(),
        change.trim(),
        next.unwrap_or_default().trim()
    )
}

fn revision_ref(doc_type: &str, document: &str, revision_number: &str, date: &str) -> String {
    let name = if is_legislation(doc_type) || revision_number.is_empty() {
        format!("{document} {date}.pdf")
    } else {
        format!("{document} {revision_number} {date}.pdf")
    };
    format!("{}/{name}", folder(doc_type))
}

fn apply_entry(tx: &Transaction<'_>, entry: &SaveEntry, stamp: &str) -> Result<(), UpstreamError> {
    let id: i64 = entry
        .id
        .trim()
        .parse()
        .map_err(|_| UpstreamError::InvalidQuery(format!("invalid row id '{}'", entry.id)))?;
    let value = entry.value.trim().to_ascii_lowercase();

    let existing: Option<String> = tx
        .query_row(
            &format!("SELECT {STATUS_SQL} FROM changes WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(existing) = existing else {
        return Err(UpstreamError::InvalidQuery(format!("unknown row id {id}")));
    };

    let flags = match value.as_str() {
        "not relevant" => {
            tx.execute(
                "UPDATE changes SET validated_not_relevant = 1, last_submit = ?2 WHERE id = ?1",
                params![id, stamp],
            )?;
            return Ok(());
        }
        _ if value == existing => return Ok(()),
        "not started" => (false, false),
        "reviewed" => (true, false),
        "addressed" => (true, true),
        _ => {
            return Err(UpstreamError::InvalidQuery(format!(
                "unsupported status '{}'",
                entry.value
            )));
        }
    };

    let (reviewed, addressed) = flags;
    tx.execute(
        "UPDATE changes
         SET reviewed = ?2, addressed = ?3, validated_not_relevant = 0, last_submit = ?4
         WHERE id = ?1",
        params![id, reviewed, addressed, stamp],
    )?;
    Ok(())
}

#[async_trait]
impl Upstream for LocalUpstream {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn doc_types(&self) -> Result<Vec<String>, UpstreamError> {
        Ok(owned(&DOC_TYPES))
    }

    async fn documents(&self, doc_type: &str) -> Result<Vec<String>, UpstreamError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(
            "SELECT DISTINCT document_name FROM changes
             WHERE document_type = ?1 ORDER BY document_name",
        )?;
        let documents = statement
            .query_map(params![folder(doc_type)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(documents)
    }

    async fn recency_periods(&self) -> Result<Vec<String>, UpstreamError> {
        Ok(owned(&RECENCY_PERIODS))
    }

    async fn sections(
        &self,
        doc_type: &str,
        document: &str,
        recency: &str,
    ) -> Result<Vec<String>, UpstreamError> {
        let changes = self.document_changes(doc_type, document)?;
        let changes = self.within_recency(changes, recency)?;

        let mut sections: Vec<String> = Vec::new();
        for change in changes {
            if !sections.contains(&change.section_title) {
                sections.push(change.section_title);
            }
        }
        Ok(sections)
    }

    async fn relevance_types(&self) -> Result<Vec<String>, UpstreamError> {
        Ok(owned(&RELEVANCE_TYPES))
    }

    async fn doc_changes(&self, tuple: &ResolvedTuple) -> Result<DocChangeResponse, UpstreamError> {
        let full_document = self.document_changes(&tuple.doc_type, &tuple.document)?;
        let Some(latest) = full_document
            .iter()
            .max_by(|left, right| left.current_revision.cmp(&right.current_revision))
            .cloned()
        else {
            return Err(UpstreamError::InvalidQuery(format!(
                "no changes recorded for {}",
                tuple.document
            )));
        };

        let recent = self.within_recency(full_document, &tuple.recency)?;
        let in_section: Vec<&StoredChange> = recent
            .iter()
            .filter(|change| {
                tuple.section.eq_ignore_ascii_case(ALL_SECTIONS)
                    || change.section_title == tuple.section
            })
            .collect();
        let relevant_in_section = in_section
            .iter()
            .filter(|change| change.matches_relevance("relevant"))
            .count();

        let mut selected: Vec<&StoredChange> = in_section
            .iter()
            .copied()
            .filter(|change| change.matches_relevance(&tuple.relevance))
            .collect();
        selected.sort_by(|left, right| {
            right
                .current_revision
                .cmp(&left.current_revision)
                .then(right.id.cmp(&left.id))
        });

        let with_revision_number = !is_legislation(&tuple.doc_type);
        let detail_df = selected
            .iter()
            .map(|change| change.detail_row(with_revision_number))
            .collect();

        let table_heading = if tuple.section.eq_ignore_ascii_case(ALL_SECTIONS) {
            "Document Changes Detailed Table".to_string()
        } else {
            format!("Section {} Changes Detailed Table", tuple.section)
        };

        Ok(DocChangeResponse {
            doc_type: tuple.doc_type.clone(),
            num_tot_changes: Some(recent.len() as u64),
            num_sec_changes: Some(in_section.len() as u64),
            num_rel_sec_changes: Some(relevant_in_section as u64),
            info: Some("block".to_string()),
            current_rev_pdf: revision_ref(
                &tuple.doc_type,
                &tuple.document,
                &latest.revision_number,
                &latest.current_revision,
            ),
            previous_rev_pdf: revision_ref(
                &tuple.doc_type,
                &tuple.document,
                &latest.prev_revision_number,
                &latest.previous_revision,
            ),
            current_rev: latest.current_revision,
            previous_rev: latest.previous_revision,
            table_heading,
            status: owned(&STATUS_VOCABULARY),
            detail_df,
        })
    }

    async fn save_changes(&self, batch: &[SaveEntry]) -> Result<SaveChangesResponse, UpstreamError> {
        let stamp = util::submit_timestamp();
        let mut connection = self.lock()?;

        let outcome = (|| -> Result<(), UpstreamError> {
            let tx = connection.transaction()?;
            for entry in batch {
                apply_entry(&tx, entry, &stamp)?;
            }
            tx.commit()?;
            Ok(())
        })();

        Ok(match outcome {
            Ok(()) => {
                info!(entries = batch.len(), "saved status changes");
                SaveChangesResponse {
                    success: true,
                    txt_msg: format!("Your changes have been saved at {stamp}"),
                }
            }
            Err(err) => {
                warn!(error = %err, entries = batch.len(), "status batch rolled back");
                SaveChangesResponse {
                    success: false,
                    txt_msg: SAVE_FAILED_MESSAGE.to_string(),
                }
            }
        })
    }

    async fn link_relevance_types(&self) -> Result<Vec<String>, UpstreamError> {
        Ok(owned(&LINK_RELEVANCY_TYPES))
    }

    async fn link_recency_types(&self) -> Result<Vec<String>, UpstreamError> {
        Ok(owned(&RECENCY_PERIODS))
    }
}
