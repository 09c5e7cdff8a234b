use std::fmt;

use serde::Serialize;

use crate::catalog::{NO_OPTIONS_AVAILABLE, NO_SECTIONS_AVAILABLE};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    DocType,
    Document,
    Recency,
    Section,
    Relevance,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::DocType,
        Stage::Document,
        Stage::Recency,
        Stage::Section,
        Stage::Relevance,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn ancestors(self) -> &'static [Stage] {
        &Self::ALL[..self.index()]
    }

    pub fn descendants(self) -> &'static [Stage] {
        &Self::ALL[self.index() + 1..]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocType => "doc-type",
            Self::Document => "document",
            Self::Recency => "recency",
            Self::Section => "section",
            Self::Relevance => "relevance",
        }
    }

    pub fn empty_label(self) -> &'static str {
        match self {
            Self::Section => NO_SECTIONS_AVAILABLE,
            _ => NO_OPTIONS_AVAILABLE,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
