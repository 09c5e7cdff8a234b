use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::UpstreamArgs;
use crate::upstream::{FallbackBackend, HttpUpstream, LocalUpstream, Upstream};

pub mod ingest;
pub mod options;
pub mod review;
pub mod status;

const DATABASE_FILE: &str = "revwatch.sqlite";

pub fn connect_backend(args: &UpstreamArgs) -> Result<Arc<FallbackBackend>> {
    let upstream: Box<dyn Upstream> = match &args.db_path {
        Some(path) => Box::new(LocalUpstream::open(path)?),
        None => Box::new(
            HttpUpstream::new(&args.base_url, Duration::from_millis(args.timeout_ms))
                .context("failed to build upstream http client")?,
        ),
    };

    info!(
        upstream = upstream.name(),
        base_url = %args.base_url,
        timeout_ms = args.timeout_ms,
        "data source ready"
    );
    Ok(Arc::new(FallbackBackend::new(upstream)))
}

pub fn report_fallbacks(backend: &FallbackBackend) {
    let fallbacks = backend.fallback_count();
    if fallbacks > 0 {
        warn!(
            fallbacks,
            "upstream was unavailable; some answers are placeholder data"
        );
    }
}

pub fn database_path(cache_root: &Path, db_path: Option<&Path>) -> PathBuf {
    db_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_root.join(DATABASE_FILE))
}
