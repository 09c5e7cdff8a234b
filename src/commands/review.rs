use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cascade::{CascadePhase, ResolvedTuple, Stage};
use crate::cli::ReviewArgs;
use crate::client::OptionClient;
use crate::commands::{connect_backend, report_fallbacks};
use crate::normalize::{ChangeRow, NormalizedChanges, ReviewSessionMetrics};
use crate::review::{NoticeKind, ReviewTable, SaveNotice};
use crate::session::ReviewSession;
use crate::util::write_json_stdout;

#[derive(Debug, Serialize)]
struct ReviewReport<'a> {
    filters: ResolvedTuple,
    table_heading: &'a str,
    metrics: &'a ReviewSessionMetrics,
    vocabulary: &'a [String],
    rows: Vec<ReviewRowView<'a>>,
    notice: Option<&'a SaveNotice>,
}

#[derive(Debug, Serialize)]
struct ReviewRowView<'a> {
    #[serde(flatten)]
    row: &'a ChangeRow,
    selected_status: Option<&'a str>,
    selected_option: Option<usize>,
}

pub async fn run(args: ReviewArgs) -> Result<()> {
    let path = args.filters.path();
    if path.len() < Stage::ALL.len() {
        let missing = Stage::ALL[path.len()];
        bail!("--{missing} is required to resolve a change set");
    }
    let edits = args
        .edits
        .iter()
        .map(|raw| parse_edit(raw))
        .collect::<Result<Vec<_>>>()?;

    let backend = connect_backend(&args.upstream)?;
    let mut session = ReviewSession::open(OptionClient::new(backend.clone())).await?;
    session.select_path(&path).await?;
    report_fallbacks(&backend);

    if let CascadePhase::Failed(reason) = session.controller().phase() {
        bail!("change set was rejected: {reason}");
    }

    for (row_id, status) in &edits {
        session
            .table_mut()
            .set_status(row_id, status)
            .with_context(|| format!("failed to apply edit {row_id}={status}"))?;
    }
    if !edits.is_empty() {
        info!(edits = edits.len(), "applied status edits");
    }

    if args.commit {
        session.commit().await?;
    }

    let controller = session.controller();
    let filters = controller
        .filters()
        .resolved()
        .context("filter tuple is not resolved")?;
    let changes = controller
        .resolution()
        .context("no change set was resolved")?;
    let table = session.table();
    let notice = table.notice(Instant::now());

    if args.json {
        write_json_stdout(&report(filters, changes, table, notice))?;
    } else {
        write_text(&filters, changes, table, notice)?;
    }

    match notice {
        Some(notice) if notice.kind == NoticeKind::Failed => bail!("{}", notice.message),
        _ => Ok(()),
    }
}

fn parse_edit(raw: &str) -> Result<(String, String)> {
    let (row_id, status) = raw
        .split_once('=')
        .with_context(|| format!("edit '{raw}' must look like ROW_ID=STATUS"))?;
    let (row_id, status) = (row_id.trim(), status.trim());
    if row_id.is_empty() || status.is_empty() {
        bail!("edit '{raw}' must look like ROW_ID=STATUS");
    }
    Ok((row_id.to_string(), status.to_string()))
}

fn report<'a>(
    filters: ResolvedTuple,
    changes: &'a NormalizedChanges,
    table: &'a ReviewTable,
    notice: Option<&'a SaveNotice>,
) -> ReviewReport<'a> {
    ReviewReport {
        filters,
        table_heading: &changes.table_heading,
        metrics: &changes.metrics,
        vocabulary: table.vocabulary(),
        rows: table
            .rows()
            .iter()
            .map(|row| ReviewRowView {
                row,
                selected_status: table.status_of(row.row_id.as_str()),
                selected_option: table.selected_index(row.row_id.as_str()),
            })
            .collect(),
        notice,
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

fn write_text(
    filters: &ResolvedTuple,
    changes: &NormalizedChanges,
    table: &ReviewTable,
    notice: Option<&SaveNotice>,
) -> Result<()> {
    let metrics = &changes.metrics;
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "{}", changes.table_heading)?;
    writeln!(
        output,
        "Filters: {} / {} / {} / section={} / relevance={}",
        filters.doc_type, filters.document, filters.recency, filters.section, filters.relevance
    )?;
    writeln!(
        output,
        "Changes: total={} section={} relevant_in_section={}",
        count(metrics.total_changes),
        count(metrics.section_changes),
        count(metrics.relevant_section_changes),
    )?;
    writeln!(
        output,
        "Revisions: current={} ({}) previous={} ({})",
        metrics.current_revision,
        metrics.current_revision_ref,
        metrics.previous_revision,
        metrics.previous_revision_ref,
    )?;
    writeln!(output, "Statuses: {}", table.vocabulary().join(" | "))?;
    writeln!(output, "Rows: {}", table.rows().len())?;

    for row in table.rows() {
        let revision = match &row.revision_number {
            Some(number) if !number.is_empty() => format!("{number} {}", row.revision_label),
            _ => row.revision_label.clone(),
        };
        writeln!(
            output,
            "{}\t{}\t{}\tp.{}\t{}\t[{}]",
            row.row_id,
            revision,
            row.section_title,
            row.page_number,
            row.relevance.as_str(),
            table.status_of(row.row_id.as_str()).unwrap_or(&row.status),
        )?;
        for line in row.change_text.lines() {
            writeln!(output, "\t{line}")?;
        }
        if !row.strong_links.is_empty() || !row.soft_links.is_empty() {
            writeln!(
                output,
                "\tstrong: {}\tsoft: {}",
                row.strong_links.join(", "),
                row.soft_links.join(", ")
            )?;
        }
    }

    if let Some(notice) = notice {
        let kind = match notice.kind {
            NoticeKind::Saved => "saved",
            NoticeKind::Failed => "failed",
        };
        writeln!(output, "Save {kind}: {}", notice.message)?;
    }

    output.flush()?;
    Ok(())
}
