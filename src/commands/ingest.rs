use std::fs;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::IngestArgs;
use crate::commands::database_path;
use crate::upstream::{ChangeRecord, LocalUpstream};

pub fn run(args: IngestArgs) -> Result<()> {
    let db_path = database_path(&args.cache_root, args.db_path.as_deref());

    let raw = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let records: Vec<ChangeRecord> = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    if records.is_empty() {
        bail!("{} contains no change records", args.input.display());
    }

    let store = LocalUpstream::open(&db_path)?;
    let ingested = store.ingest(&records)?;

    info!(
        path = %db_path.display(),
        input = %args.input.display(),
        records = ingested,
        "ingest completed"
    );
    Ok(())
}
