//! Schema types for the patch proposal API.

use serde::{Deserialize, Serialize};

use fedkernel_core::{PatchId, PatchProposal, PatchStatus, RepoId};

use crate::time_fmt::format_epoch_secs;

/// Request to create a proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatchRequest {
    pub owner: String,
    pub repo: String,
    pub file_path: String,
    /// Hex node ids, as returned by the graph API.
    pub target_node_ids: Vec<String>,
    pub actor: String,
}

/// Request to claim a proposal for review.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub actor: String,
}

/// Request to decide a proposal.
#[derive(Debug, Clone, Deserialize)]
pub struct DecideRequest {
    /// "Approved" or "Rejected".
    pub outcome: String,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Query parameters for `GET /federation/patches`.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchQueueParams {
    pub status: Option<String>,
}

/// Full view of one proposal.
#[derive(Debug, Clone, Serialize)]
pub struct PatchView {
    pub patch_id: PatchId,
    pub repo_id: RepoId,
    pub owner: String,
    pub repo: String,
    pub file_path: String,
    pub target_node_ids: Vec<String>,
    pub actor: String,
    pub status: PatchStatus,
    pub conflicts_with: Vec<PatchId>,
    pub created_at: String,
    pub reviewed_by: Option<String>,
    pub decided_at: Option<String>,
    pub decided_by: Option<String>,
}

impl From<PatchProposal> for PatchView {
    fn from(p: PatchProposal) -> Self {
        PatchView {
            patch_id: p.patch_id,
            repo_id: p.repo_id,
            owner: p.owner,
            repo: p.repo,
            file_path: p.file_path,
            target_node_ids: p.target_node_ids.iter().map(|id| id.to_hex()).collect(),
            actor: p.actor,
            status: p.status,
            conflicts_with: p.conflicts_with,
            created_at: format_epoch_secs(p.created_at),
            reviewed_by: p.reviewed_by,
            decided_at: p.decided_at.map(format_epoch_secs),
            decided_by: p.decided_by,
        }
    }
}

/// Response after a decision, including the conflict cascade.
#[derive(Debug, Clone, Serialize)]
pub struct DecideResponse {
    pub patch_id: PatchId,
    pub status: PatchStatus,
    pub conflicts_with: Vec<PatchId>,
    /// Patch ids moved to Conflicted by this approval.
    pub conflicted: Vec<PatchId>,
}

/// Response listing the patch queue.
#[derive(Debug, Clone, Serialize)]
pub struct PatchQueueResponse {
    pub patches: Vec<crate::service::PatchQueueRow>,
}
