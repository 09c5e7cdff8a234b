use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cascade::Stage;

#[derive(Parser, Debug)]
#[command(
    name = "revwatch",
    version,
    about = "Drill into document revisions and review detected changes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Options(OptionsArgs),
    Review(ReviewArgs),
    Ingest(IngestArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct UpstreamArgs {
    #[arg(long, env = "BACKEND_BASE_URL", default_value = "http://localhost:5000")]
    pub base_url: String,

    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Read from a local change database instead of the remote service.
    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub doc_type: Option<String>,

    #[arg(long)]
    pub document: Option<String>,

    #[arg(long)]
    pub recency: Option<String>,

    #[arg(long)]
    pub section: Option<String>,

    #[arg(long)]
    pub relevance: Option<String>,
}

impl FilterArgs {
    // Values in stage order, stopping at the first one not given.
    pub fn path(&self) -> Vec<&str> {
        [
            &self.doc_type,
            &self.document,
            &self.recency,
            &self.section,
            &self.relevance,
        ]
        .into_iter()
        .map_while(|value| value.as_deref())
        .collect()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StageArg {
    DocType,
    Document,
    Recency,
    Section,
    Relevance,
    LinkRelevance,
    LinkRecency,
}

impl StageArg {
    pub fn cascade_stage(self) -> Option<Stage> {
        match self {
            Self::DocType => Some(Stage::DocType),
            Self::Document => Some(Stage::Document),
            Self::Recency => Some(Stage::Recency),
            Self::Section => Some(Stage::Section),
            Self::Relevance => Some(Stage::Relevance),
            Self::LinkRelevance | Self::LinkRecency => None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OptionsArgs {
    #[command(flatten)]
    pub upstream: UpstreamArgs,

    #[arg(long, value_enum)]
    pub stage: StageArg,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    #[command(flatten)]
    pub upstream: UpstreamArgs,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Status edit as ROW_ID=STATUS; may be repeated.
    #[arg(long = "set", value_name = "ROW_ID=STATUS")]
    pub edits: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub commit: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = ".cache/revwatch")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// JSON array of exported change records.
    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/revwatch")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value = "2022-01-01")]
    pub since: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
