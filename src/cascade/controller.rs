use tracing::{debug, info, warn};

use super::{
    CascadeError, CascadeRequest, CascadeResponse, Delivery, FilterState, OptionQuery, OptionSet,
    RequestTag, ResponsePayload, Stage, Target,
};
use crate::normalize::{NormalizedChanges, normalize_payload};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CascadePhase {
    Idle,
    Loading(Stage),
    Choosing(Stage),
    Resolving,
    Resolved,
    Failed(String),
}

#[derive(Debug)]
pub struct CascadeController {
    filters: FilterState,
    options: [Option<OptionSet>; 5],
    pending: Option<RequestTag>,
    phase: CascadePhase,
    resolution: Option<NormalizedChanges>,
    issued: u64,
}

impl Default for CascadeController {
    fn default() -> Self {
        Self::new()
    }
}

impl CascadeController {
    pub fn new() -> Self {
        Self {
            filters: FilterState::default(),
            options: Default::default(),
            pending: None,
            phase: CascadePhase::Idle,
            resolution: None,
            issued: 0,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn phase(&self) -> &CascadePhase {
        &self.phase
    }

    pub fn options(&self, stage: Stage) -> Option<&OptionSet> {
        self.options[stage.index()].as_ref()
    }

    pub fn resolution(&self) -> Option<&NormalizedChanges> {
        self.resolution.as_ref()
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<&RequestTag> {
        self.pending.as_ref()
    }

    // Drives the disabled/enabled state of each stage's selector.
    pub fn is_enabled(&self, stage: Stage) -> bool {
        self.filters.is_settable(stage) && self.options(stage).is_some()
    }

    pub fn start(&mut self) -> Result<CascadeRequest, CascadeError> {
        self.filters = FilterState::default();
        self.options = Default::default();
        self.resolution = None;
        self.issue_options(Stage::DocType)
    }

    pub fn select(&mut self, stage: Stage, value: &str) -> Result<CascadeRequest, CascadeError> {
        let next = self.filters.with_stage(stage, value)?;

        if let Some(options) = self.options(stage) {
            if !options.offers(value) {
                warn!(stage = %stage, value, "selected value is not among the offered options");
            }
        }

        self.filters = next;
        for descendant in stage.descendants() {
            self.options[descendant.index()] = None;
        }
        self.resolution = None;

        match stage.next() {
            Some(next_stage) => self.issue_options(next_stage),
            None => self.issue_rows(),
        }
    }

    // Re-requests the change set for the current tuple, typically after a
    // rejected payload left the controller in `Failed`.
    pub fn retry(&mut self) -> Result<CascadeRequest, CascadeError> {
        if self.filters.resolved().is_none() {
            return Err(CascadeError::Unresolved);
        }
        self.resolution = None;
        self.issue_rows()
    }

    pub fn deliver(&mut self, response: CascadeResponse) -> Delivery {
        let CascadeResponse { tag, payload } = response;

        if !self.is_current(&tag) {
            debug!(
                target_stage = ?tag.target(),
                seq = tag.seq(),
                prefix = ?tag.prefix(),
                "discarding stale cascade response"
            );
            return Delivery::Discarded;
        }

        match (tag.target(), payload) {
            (Target::Options(stage), ResponsePayload::Options(values)) => {
                self.pending = None;
                info!(stage = %stage, options = values.len(), "stage options loaded");
                self.options[stage.index()] =
                    Some(OptionSet::build(stage, tag.prefix().to_vec(), values));
                self.phase = CascadePhase::Choosing(stage);
                Delivery::Applied
            }
            (Target::Rows, ResponsePayload::Rows(payload)) => {
                self.pending = None;
                match normalize_payload(&payload) {
                    Ok(changes) => {
                        info!(
                            rows = changes.rows.len(),
                            doc_type = %changes.doc_type,
                            "change set resolved"
                        );
                        self.resolution = Some(changes);
                        self.phase = CascadePhase::Resolved;
                    }
                    Err(err) => {
                        warn!(error = %err, "rejecting malformed change payload");
                        self.phase = CascadePhase::Failed(err.to_string());
                    }
                }
                Delivery::Applied
            }
            (target, _) => {
                warn!(target_stage = ?target, "response payload does not match its request");
                Delivery::Discarded
            }
        }
    }

    fn is_current(&self, tag: &RequestTag) -> bool {
        let expected_prefix = match tag.target() {
            Target::Options(stage) => self.filters.prefix_before(stage),
            Target::Rows => self.filters.full_prefix(),
        };
        self.pending.as_ref() == Some(tag) && tag.prefix() == expected_prefix.as_slice()
    }

    fn issue(&mut self, target: Target) -> RequestTag {
        self.issued += 1;
        let prefix = match target {
            Target::Options(stage) => self.filters.prefix_before(stage),
            Target::Rows => self.filters.full_prefix(),
        };
        let tag = RequestTag::new(target, prefix, self.issued);
        self.pending = Some(tag.clone());
        tag
    }

    fn issue_options(&mut self, stage: Stage) -> Result<CascadeRequest, CascadeError> {
        let query = OptionQuery::for_stage(stage, &self.filters)?;
        let tag = self.issue(Target::Options(stage));
        self.phase = CascadePhase::Loading(stage);
        Ok(CascadeRequest::Options { tag, query })
    }

    fn issue_rows(&mut self) -> Result<CascadeRequest, CascadeError> {
        let tuple = self
            .filters
            .resolved()
            .ok_or(CascadeError::Unresolved)?;
        let tag = self.issue(Target::Rows);
        self.phase = CascadePhase::Resolving;
        Ok(CascadeRequest::Rows { tag, tuple })
    }
}
