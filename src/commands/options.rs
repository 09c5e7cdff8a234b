use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cascade::{OptionSet, Stage};
use crate::cli::{OptionsArgs, StageArg};
use crate::client::OptionClient;
use crate::commands::{connect_backend, report_fallbacks};
use crate::session::ReviewSession;
use crate::upstream::Backend;
use crate::util::write_json_stdout;

pub async fn run(args: OptionsArgs) -> Result<()> {
    let backend = connect_backend(&args.upstream)?;

    let Some(stage) = args.stage.cascade_stage() else {
        let values = match args.stage {
            StageArg::LinkRelevance => backend.link_relevance_types().await,
            _ => backend.link_recency_types().await,
        };
        info!(options = values.len(), "link filter options loaded");
        report_fallbacks(&backend);
        return if args.json {
            write_json_stdout(&values)
        } else {
            write_plain(&values)
        };
    };

    let path = args.filters.path();
    if path.len() < stage.index() {
        let missing = Stage::ALL[path.len()];
        bail!("--{missing} is required to list {stage} options");
    }

    let mut session = ReviewSession::open(OptionClient::new(backend.clone())).await?;
    session.select_path(&path[..stage.index()]).await?;
    report_fallbacks(&backend);

    let controller = session.controller();
    if !controller.is_enabled(stage) {
        bail!("{stage} cannot be chosen yet");
    }
    let options = controller
        .options(stage)
        .with_context(|| format!("no {stage} options were loaded"))?;

    if args.json {
        write_json_stdout(options)
    } else {
        write_option_set(options)
    }
}

fn write_plain(values: &[String]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    for value in values {
        writeln!(output, "{value}")?;
    }
    output.flush()?;
    Ok(())
}

fn write_option_set(options: &OptionSet) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Stage: {}", options.stage())?;
    if !options.prefix().is_empty() {
        writeln!(output, "Under: {}", options.prefix().join(" / "))?;
    }
    for entry in options.entries() {
        if entry.sentinel {
            writeln!(output, "  ({})", entry.label)?;
        } else {
            writeln!(output, "  {}", entry.label)?;
        }
    }
    output.flush()?;
    Ok(())
}
