use thiserror::Error;

use crate::model::DocChangeResponse;

mod controller;
mod filter;
mod options;
mod stage;
#[cfg(test)]
mod tests;

pub use controller::{CascadeController, CascadePhase};
pub use filter::{FilterState, ResolvedTuple};
pub use options::{OptionEntry, OptionSet};
pub use stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeError {
    #[error("{stage} cannot be empty")]
    EmptyValue { stage: Stage },

    #[error("{stage} cannot be set before {missing} is chosen")]
    UnresolvedAncestor { stage: Stage, missing: Stage },

    #[error("the filter tuple is not fully resolved")]
    Unresolved,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Target {
    Options(Stage),
    Rows,
}

// Identifies one outstanding request by what it fetches, the filter prefix it
// was issued under, and its issue order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTag {
    target: Target,
    prefix: Vec<String>,
    seq: u64,
}

impl RequestTag {
    fn new(target: Target, prefix: Vec<String>, seq: u64) -> Self {
        Self {
            target,
            prefix,
            seq,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionQuery {
    DocTypes,
    Documents {
        doc_type: String,
    },
    RecencyPeriods,
    Sections {
        doc_type: String,
        document: String,
        recency: String,
    },
    RelevanceTypes,
}

impl OptionQuery {
    fn for_stage(stage: Stage, filters: &FilterState) -> Result<Self, CascadeError> {
        let value = |ancestor: Stage| {
            filters
                .get(ancestor)
                .map(ToOwned::to_owned)
                .ok_or(CascadeError::UnresolvedAncestor {
                    stage,
                    missing: ancestor,
                })
        };

        Ok(match stage {
            Stage::DocType => Self::DocTypes,
            Stage::Document => Self::Documents {
                doc_type: value(Stage::DocType)?,
            },
            Stage::Recency => Self::RecencyPeriods,
            Stage::Section => Self::Sections {
                doc_type: value(Stage::DocType)?,
                document: value(Stage::Document)?,
                recency: value(Stage::Recency)?,
            },
            Stage::Relevance => Self::RelevanceTypes,
        })
    }
}

#[derive(Clone, Debug)]
pub enum CascadeRequest {
    Options { tag: RequestTag, query: OptionQuery },
    Rows { tag: RequestTag, tuple: ResolvedTuple },
}

impl CascadeRequest {
    pub fn tag(&self) -> &RequestTag {
        match self {
            Self::Options { tag, .. } | Self::Rows { tag, .. } => tag,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ResponsePayload {
    Options(Vec<String>),
    Rows(DocChangeResponse),
}

#[derive(Clone, Debug)]
pub struct CascadeResponse {
    pub tag: RequestTag,
    pub payload: ResponsePayload,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Delivery {
    Applied,
    Discarded,
}
