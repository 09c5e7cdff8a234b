use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Upstream, UpstreamError};
use crate::cascade::ResolvedTuple;
use crate::model::{
    DocChangeResponse, DocSelectResponse, DocTypesResponse, LinkRelSelectResponse,
    RecSelectResponse, RecencySelectResponse, RelevanceSelectResponse, SaveChangesResponse,
    SaveEntry, SectionSelectResponse,
};

#[derive(Clone)]
pub struct HttpUpstream {
    http: Client,
    base_url: String,
}

impl HttpUpstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        debug!(path, "upstream GET");
        let response = self.http.get(self.url(path)).query(query).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl Upstream for HttpUpstream {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn doc_types(&self) -> Result<Vec<String>, UpstreamError> {
        let response: DocTypesResponse = self.get("/doc_types", &[]).await?;
        Ok(response.doc_types)
    }

    async fn documents(&self, doc_type: &str) -> Result<Vec<String>, UpstreamError> {
        let response: DocSelectResponse = self.get("/doc_select", &[("doc_typ", doc_type)]).await?;
        Ok(response.docs)
    }

    async fn recency_periods(&self) -> Result<Vec<String>, UpstreamError> {
        let response: RecencySelectResponse = self.get("/recency_select", &[]).await?;
        Ok(response.recency_periods)
    }

    async fn sections(
        &self,
        doc_type: &str,
        document: &str,
        recency: &str,
    ) -> Result<Vec<String>, UpstreamError> {
        let response: SectionSelectResponse = self
            .get(
                "/sec_select",
                &[("doc_typ", doc_type), ("docs", document), ("recency", recency)],
            )
            .await?;
        response.titles()
    }

    async fn relevance_types(&self) -> Result<Vec<String>, UpstreamError> {
        let response: RelevanceSelectResponse = self.get("/relevance_select", &[]).await?;
        Ok(response.rel_type)
    }

    async fn doc_changes(&self, tuple: &ResolvedTuple) -> Result<DocChangeResponse, UpstreamError> {
        self.get("/doc_change", &tuple.query_pairs()).await
    }

    async fn save_changes(&self, batch: &[SaveEntry]) -> Result<SaveChangesResponse, UpstreamError> {
        let results = serde_json::to_string(batch)?;
        debug!(entries = batch.len(), "upstream POST /save_changes");
        let response = self
            .http
            .post(self.url("/save_changes"))
            .form(&[("results", results.as_str())])
            .send()
            .await?;
        decode(response).await
    }

    async fn link_relevance_types(&self) -> Result<Vec<String>, UpstreamError> {
        let response: LinkRelSelectResponse = self.get("/link_rel_select", &[]).await?;
        Ok(response.link_rel_types)
    }

    async fn link_recency_types(&self) -> Result<Vec<String>, UpstreamError> {
        let response: RecSelectResponse = self.get("/rec_select", &[]).await?;
        Ok(response.recency_types)
    }
}
