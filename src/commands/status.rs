use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::database_path;
use crate::upstream::LocalUpstream;
use crate::util::{parse_revision_date, write_json_stdout};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = database_path(&args.cache_root, args.db_path.as_deref());
    let since = parse_revision_date(&args.since).context("invalid --since date")?;

    info!(path = %db_path.display(), since = %since, "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let store = LocalUpstream::open(&db_path)?;
    let stats = store.backlog_stats(since)?;

    info!(
        not_started = stats.not_started,
        reviewed = stats.reviewed,
        addressed = stats.addressed,
        "review backlog"
    );

    if args.json {
        write_json_stdout(&stats)?;
    }
    Ok(())
}
