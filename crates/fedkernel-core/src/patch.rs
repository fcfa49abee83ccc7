//! Patch proposals and their approval workflow.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{NodeId, PatchId, RepoId};

/// Workflow status of a patch proposal.
///
/// Proposed -> UnderReview -> {Approved, Rejected}; Conflicted is entered
/// automatically when an overlapping proposal wins approval first;
/// Superseded when a newer proposal from the same actor replaces it.
/// Approved, Rejected, and Superseded are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchStatus {
    Proposed,
    UnderReview,
    Conflicted,
    Approved,
    Rejected,
    Superseded,
}

impl PatchStatus {
    /// True for statuses that end the workflow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PatchStatus::Approved | PatchStatus::Rejected | PatchStatus::Superseded
        )
    }

    /// TEXT form for storage columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStatus::Proposed => "Proposed",
            PatchStatus::UnderReview => "UnderReview",
            PatchStatus::Conflicted => "Conflicted",
            PatchStatus::Approved => "Approved",
            PatchStatus::Rejected => "Rejected",
            PatchStatus::Superseded => "Superseded",
        }
    }

    /// Parses the TEXT form back into a status.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "Proposed" => Ok(PatchStatus::Proposed),
            "UnderReview" => Ok(PatchStatus::UnderReview),
            "Conflicted" => Ok(PatchStatus::Conflicted),
            "Approved" => Ok(PatchStatus::Approved),
            "Rejected" => Ok(PatchStatus::Rejected),
            "Superseded" => Ok(PatchStatus::Superseded),
            other => Err(CoreError::UnknownPatchStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of an explicit decision on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecideOutcome {
    Approved,
    Rejected,
}

impl DecideOutcome {
    /// Parses the wire form ("Approved" / "Rejected").
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "Approved" => Ok(DecideOutcome::Approved),
            "Rejected" => Ok(DecideOutcome::Rejected),
            other => Err(CoreError::UnknownOutcome {
                value: other.to_string(),
            }),
        }
    }
}

/// A proposed patch against one or more nodes of a file.
///
/// `owner`/`repo` are denormalized from the target repository for query
/// convenience. Two proposals conflict iff their target node sets
/// intersect while both are non-terminal; the losing side's
/// `conflicts_with` records which approved patch displaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchProposal {
    pub patch_id: PatchId,
    pub repo_id: RepoId,
    pub owner: String,
    pub repo: String,
    pub file_path: String,
    pub target_node_ids: Vec<NodeId>,
    pub actor: String,
    pub status: PatchStatus,
    pub conflicts_with: Vec<PatchId>,
    /// Unix seconds.
    pub created_at: i64,
    pub reviewed_by: Option<String>,
    pub decided_at: Option<i64>,
    pub decided_by: Option<String>,
}

impl PatchProposal {
    /// True when this proposal's target set intersects `node_ids`.
    pub fn targets_overlap(&self, node_ids: &[NodeId]) -> bool {
        self.target_node_ids
            .iter()
            .any(|id| node_ids.contains(id))
    }
}
