use async_trait::async_trait;
use thiserror::Error;

use crate::cascade::ResolvedTuple;
use crate::model::{DocChangeResponse, SaveChangesResponse, SaveEntry};

mod fallback;
mod http;
mod local;
mod placeholder;
#[cfg(test)]
pub(crate) mod testing;

pub use fallback::FallbackBackend;
pub use http::HttpUpstream;
pub use local::{BacklogStats, ChangeRecord, LocalUpstream};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream payload could not be decoded: {0}")]
    Decode(String),

    #[error("invalid upstream query: {0}")]
    InvalidQuery(String),

    #[error("local store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<rusqlite::Error> for UpstreamError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.to_string())
    }
}

// Raw data-service contract. Every call may fail.
#[async_trait]
pub trait Upstream: Send + Sync {
    fn name(&self) -> &'static str;

    async fn doc_types(&self) -> Result<Vec<String>, UpstreamError>;

    async fn documents(&self, doc_type: &str) -> Result<Vec<String>, UpstreamError>;

    async fn recency_periods(&self) -> Result<Vec<String>, UpstreamError>;

    async fn sections(
        &self,
        doc_type: &str,
        document: &str,
        recency: &str,
    ) -> Result<Vec<String>, UpstreamError>;

    async fn relevance_types(&self) -> Result<Vec<String>, UpstreamError>;

    async fn doc_changes(&self, tuple: &ResolvedTuple) -> Result<DocChangeResponse, UpstreamError>;

    async fn save_changes(&self, batch: &[SaveEntry]) -> Result<SaveChangesResponse, UpstreamError>;

    async fn link_relevance_types(&self) -> Result<Vec<String>, UpstreamError>;

    async fn link_recency_types(&self) -> Result<Vec<String>, UpstreamError>;
}

// What the cascade and review table see: reads always produce a well-shaped
// answer, only the batch save can fail.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn doc_types(&self) -> Vec<String>;

    async fn documents(&self, doc_type: &str) -> Vec<String>;

    async fn recency_periods(&self) -> Vec<String>;

    async fn sections(&self, doc_type: &str, document: &str, recency: &str) -> Vec<String>;

    async fn relevance_types(&self) -> Vec<String>;

    async fn doc_changes(&self, tuple: &ResolvedTuple) -> DocChangeResponse;

    async fn save_changes(&self, batch: &[SaveEntry]) -> Result<SaveChangesResponse, UpstreamError>;

    async fn link_relevance_types(&self) -> Vec<String>;

    async fn link_recency_types(&self) -> Vec<String>;
}
