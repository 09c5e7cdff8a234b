use std::sync::Arc;

use tracing::debug;

use crate::cascade::{CascadeRequest, CascadeResponse, OptionQuery, ResponsePayload};
use crate::upstream::Backend;

// Turns the controller's requests into backend calls. It holds no cascade
// state, so a response can be delivered whenever it completes and the
// controller decides whether it still applies.
#[derive(Clone)]
pub struct OptionClient {
    backend: Arc<dyn Backend>,
}

impl OptionClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub async fn fetch(&self, request: CascadeRequest) -> CascadeResponse {
        match request {
            CascadeRequest::Options { tag, query } => {
                debug!(target_stage = ?tag.target(), seq = tag.seq(), "fetching stage options");
                let values = self.options(&query).await;
                CascadeResponse {
                    tag,
                    payload: ResponsePayload::Options(values),
                }
            }
            CascadeRequest::Rows { tag, tuple } => {
                debug!(seq = tag.seq(), "fetching change set");
                let payload = self.backend.doc_changes(&tuple).await;
                CascadeResponse {
                    tag,
                    payload: ResponsePayload::Rows(payload),
                }
            }
        }
    }

    async fn options(&self, query: &OptionQuery) -> Vec<String> {
        match query {
            OptionQuery::DocTypes => self.backend.doc_types().await,
            OptionQuery::Documents { doc_type } => self.backend.documents(doc_type).await,
            OptionQuery::RecencyPeriods => self.backend.recency_periods().await,
            OptionQuery::Sections {
                doc_type,
                document,
                recency,
            } => self.backend.sections(doc_type, document, recency).await,
            OptionQuery::RelevanceTypes => self.backend.relevance_types().await,
        }
    }
}
