use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Upstream, UpstreamError, placeholder};
use crate::cascade::ResolvedTuple;
use crate::catalog::owned;
use crate::model::{DocChangeResponse, SaveChangesResponse, SaveEntry};

pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

// In-process upstream double with canned answers, optional latency per
// recency period, and a journal of every call made against it.
#[derive(Clone)]
pub(crate) struct ScriptedUpstream {
    available: bool,
    save_available: bool,
    documents: Vec<String>,
    sections: Option<Vec<String>>,
    payload: Option<DocChangeResponse>,
    section_delays: HashMap<String, Duration>,
    calls: Journal,
    saved: Arc<Mutex<Vec<Vec<SaveEntry>>>>,
}

impl Default for ScriptedUpstream {
    fn default() -> Self {
        Self {
            available: true,
            save_available: true,
            documents: owned(&["Doc A", "Doc B"]),
            sections: None,
            payload: None,
            section_delays: HashMap::new(),
            calls: Arc::default(),
            saved: Arc::default(),
        }
    }
}

impl ScriptedUpstream {
    pub(crate) fn unavailable() -> Self {
        Self {
            available: false,
            save_available: false,
            ..Self::default()
        }
    }

    pub(crate) fn with_sections(mut self, sections: Vec<String>) -> Self {
        self.sections = Some(sections);
        self
    }

    pub(crate) fn with_payload(mut self, payload: DocChangeResponse) -> Self {
        self.payload = Some(payload);
        self
    }

    pub(crate) fn with_section_delay(mut self, recency: &str, delay: Duration) -> Self {
        self.section_delays.insert(recency.to_string(), delay);
        self
    }

    pub(crate) fn with_failing_save(mut self) -> Self {
        self.save_available = false;
        self
    }

    pub(crate) fn journal(&self) -> Journal {
        Arc::clone(&self.calls)
    }

    pub(crate) fn saved(&self) -> Arc<Mutex<Vec<Vec<SaveEntry>>>> {
        Arc::clone(&self.saved)
    }

    fn record(&self, call: String) -> Result<(), UpstreamError> {
        self.calls.lock().unwrap().push(call);
        if self.available {
            Ok(())
        } else {
            Err(UpstreamError::Transport("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn doc_types(&self) -> Result<Vec<String>, UpstreamError> {
        self.record("doc_types".to_string())?;
        Ok(placeholder::doc_types())
    }

    async fn documents(&self, doc_type: &str) -> Result<Vec<String>, UpstreamError> {
        self.record(format!("doc_select {doc_type}"))?;
        Ok(self.documents.clone())
    }

    async fn recency_periods(&self) -> Result<Vec<String>, UpstreamError> {
        self.record("recency_select".to_string())?;
        Ok(placeholder::recency_periods())
    }

    async fn sections(
        &self,
        doc_type: &str,
        document: &str,
        recency: &str,
    ) -> Result<Vec<String>, UpstreamError> {
        self.record(format!("sec_select {doc_type}/{document}/{recency}"))?;
        if let Some(delay) = self.section_delays.get(recency) {
            tokio::time::sleep(*delay).await;
        }
        Ok(self
            .sections
            .clone()
            .unwrap_or_else(|| placeholder::sections(doc_type, recency)))
    }

    async fn relevance_types(&self) -> Result<Vec<String>, UpstreamError> {
        self.record("relevance_select".to_string())?;
        Ok(placeholder::relevance_types())
    }

    async fn doc_changes(&self, tuple: &ResolvedTuple) -> Result<DocChangeResponse, UpstreamError> {
        self.record(format!(
            "doc_change {}/{}/{}/{}/{}",
            tuple.doc_type, tuple.document, tuple.recency, tuple.section, tuple.relevance
        ))?;
        Ok(self
            .payload
            .clone()
            .unwrap_or_else(|| placeholder::doc_changes(tuple)))
    }

    async fn save_changes(&self, batch: &[SaveEntry]) -> Result<SaveChangesResponse, UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("save_changes {}", batch.len()));
        if !self.save_available {
            return Err(UpstreamError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.saved.lock().unwrap().push(batch.to_vec());
        Ok(SaveChangesResponse {
            success: true,
            txt_msg: "Your changes have been saved at 01/07/2024 09:30:00".to_string(),
        })
    }

    async fn link_relevance_types(&self) -> Result<Vec<String>, UpstreamError> {
        self.record("link_rel_select".to_string())?;
        Ok(placeholder::link_relevance_types())
    }

    async fn link_recency_types(&self) -> Result<Vec<String>, UpstreamError> {
        self.record("rec_select".to_string())?;
        Ok(placeholder::link_recency_types())
    }
}
