//! Schema types for repository import and fact ingestion.

use serde::{Deserialize, Serialize};

use fedkernel_core::{Fact, RepoId, RepoStatus};
use fedkernel_store::SnapshotOutcome;

fn default_branch() -> String {
    "main".to_string()
}

/// Request to register a repository and open an ingestion window.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRepoRequest {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

/// Response after an accepted import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRepoResponse {
    pub repo_id: RepoId,
    pub status: RepoStatus,
}

/// Request carrying one snapshot's fact batch.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFactsRequest {
    pub facts: Vec<Fact>,
}

/// Response after a committed snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub repo_id: RepoId,
    pub status: RepoStatus,
    #[serde(flatten)]
    pub outcome: SnapshotOutcome,
}

/// One repository row.
#[derive(Debug, Clone, Serialize)]
pub struct RepoView {
    pub repo_id: RepoId,
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub status: RepoStatus,
}

/// Response listing all repositories.
#[derive(Debug, Clone, Serialize)]
pub struct RepoListResponse {
    pub repos: Vec<RepoView>,
}
