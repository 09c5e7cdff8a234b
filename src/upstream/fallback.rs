use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::warn;

use super::{Backend, Upstream, UpstreamError, placeholder};
use crate::cascade::ResolvedTuple;
use crate::model::{DocChangeResponse, SaveChangesResponse, SaveEntry};

// Masks upstream outages on every read: a failed call is logged and answered
// with deterministic placeholder data of the same shape. Saves pass through.
pub struct FallbackBackend {
    upstream: Box<dyn Upstream>,
    fallbacks: AtomicUsize,
}

impl FallbackBackend {
    pub fn new(upstream: Box<dyn Upstream>) -> Self {
        Self {
            upstream,
            fallbacks: AtomicUsize::new(0),
        }
    }

    pub fn fallback_count(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }

    fn settle<T>(
        &self,
        operation: &'static str,
        result: Result<T, UpstreamError>,
        placeholder: impl FnOnce() -> T,
    ) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    operation,
                    upstream = self.upstream.name(),
                    error = %err,
                    "upstream call failed; serving placeholder data"
                );
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                placeholder()
            }
        }
    }
}

#[async_trait]
impl Backend for FallbackBackend {
    async fn doc_types(&self) -> Vec<String> {
        let result = self.upstream.doc_types().await;
        self.settle("doc-types", result, placeholder::doc_types)
    }

    async fn documents(&self, doc_type: &str) -> Vec<String> {
        let result = self.upstream.documents(doc_type).await;
        self.settle("doc-select", result, || placeholder::documents(doc_type))
    }

    async fn recency_periods(&self) -> Vec<String> {
        let result = self.upstream.recency_periods().await;
        self.settle("recency-select", result, placeholder::recency_periods)
    }

    async fn sections(&self, doc_type: &str, document: &str, recency: &str) -> Vec<String> {
        let result = self.upstream.sections(doc_type, document, recency).await;
        self.settle("sec-select", result, || {
            placeholder::sections(doc_type, recency)
        })
    }

    async fn relevance_types(&self) -> Vec<String> {
        let result = self.upstream.relevance_types().await;
        self.settle("relevance-select", result, placeholder::relevance_types)
    }

    async fn doc_changes(&self, tuple: &ResolvedTuple) -> DocChangeResponse {
        let result = self.upstream.doc_changes(tuple).await;
        self.settle("doc-change", result, || placeholder::doc_changes(tuple))
    }

    async fn save_changes(&self, batch: &[SaveEntry]) -> Result<SaveChangesResponse, UpstreamError> {
        self.upstream.save_changes(batch).await
    }

    async fn link_relevance_types(&self) -> Vec<String> {
        let result = self.upstream.link_relevance_types().await;
        self.settle("link-rel-select", result, placeholder::link_relevance_types)
    }

    async fn link_recency_types(&self) -> Vec<String> {
        let result = self.upstream.link_recency_types().await;
        self.settle("rec-select", result, placeholder::link_recency_types)
    }
}
