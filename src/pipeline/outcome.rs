//! What the pipeline reports back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::pipeline::fallback::Evidence;

/// Steps a classification passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Start,
    HeuristicChecked,
    FallbackNeeded,
    Resolved,
}

/// Which stage produced the label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Resolution {
    Heuristic { keyword: String },
    Fallback { strategy: String, evidence: Evidence },
}

/// Why no label could be given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnclassifiedReason {
    /// No fallback artifact was loaded.
    FallbackUnavailable,
    /// The embedding capability failed or timed out.
    EmbeddingUnavailable(String),
    /// Any other fallback failure.
    Failed(String),
}

impl fmt::Display for UnclassifiedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnclassifiedReason::FallbackUnavailable => write!(f, "no fallback available"),
            UnclassifiedReason::EmbeddingUnavailable(msg) => {
                write!(f, "embedding unavailable: {msg}")
            }
            UnclassifiedReason::Failed(msg) => write!(f, "fallback failed: {msg}"),
        }
    }
}

/// The final answer: a label, or an explicit refusal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Resolved {
        label: CategoryLabel,
        #[serde(flatten)]
        resolution: Resolution,
    },
    Unclassified {
        #[serde(flatten)]
        reason: UnclassifiedReason,
    },
}

impl Outcome {
    /// The label, if one was reached.
    pub fn label(&self) -> Option<CategoryLabel> {
        match self {
            Outcome::Resolved { label, .. } => Some(*label),
            Outcome::Unclassified { .. } => None,
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Outcome::Unclassified { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Resolved { label, .. } => write!(f, "{label}"),
            Outcome::Unclassified { reason } => write!(f, "unclassified ({reason})"),
        }
    }
}

/// An outcome plus the states visited on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub outcome: Outcome,
    pub trace: Vec<PipelineState>,
}
