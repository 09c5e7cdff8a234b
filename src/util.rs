use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use chrono::{Local, Months, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::catalog::REVISION_DATE_FORMAT;

pub fn submit_timestamp() -> String {
    Local::now().format("%d/%m/%Y %H:%M:%S").to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_revision_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);

    NaiveDate::parse_from_str(date_part, REVISION_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d/%m/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d-%m-%Y"))
        .with_context(|| format!("unrecognized revision date: {raw}"))
}

// `None` means the window is unbounded ("Historical").
pub fn recency_cutoff(recency: &str, today: NaiveDate) -> Result<Option<NaiveDate>> {
    let normalized = recency.trim().to_ascii_lowercase();
    if normalized == "historical" {
        return Ok(None);
    }

    let mut parts = normalized.split_whitespace();
    let count = parts
        .next()
        .context("empty recency period")?
        .parse::<u32>()
        .with_context(|| format!("invalid recency period: {recency}"))?;
    let unit = parts
        .next()
        .with_context(|| format!("recency period without unit: {recency}"))?;

    let months = match unit.trim_end_matches('s') {
        "month" => count,
        "year" => count.saturating_mul(12),
        _ => bail!("unsupported recency unit in {recency}"),
    };

    today
        .checked_sub_months(Months::new(months))
        .map(Some)
        .with_context(|| format!("recency period out of range: {recency}"))
}

pub struct DocumentNameCleaner {
    date: Regex,
    revision: Regex,
}

impl DocumentNameCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            date: Regex::new(r"\s[0-9]{4}-[0-9]{2}-[0-9]{2}")
                .context("failed to compile document date regex")?,
            revision: Regex::new(r"\sRev[0-9]+|\.[0-9]+")
                .context("failed to compile document revision regex")?,
        })
    }

    pub fn clean(&self, name: &str) -> String {
        let without_date = self.date.replace_all(name, "");
        self.revision
            .replace_all(&without_date, "")
            .trim()
            .to_string()
    }
}

pub fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
