//! Fact ingestion: validate a batch, diff it against the stored graph,
//! and commit the snapshot atomically.

use serde::Serialize;

use fedkernel_core::{Fact, RepoId, RepoStatus};
use fedkernel_store::{build_snapshot_plan, FederationStore, SnapshotOutcome, StorageError};

use crate::error::ApiError;
use crate::service::FederationService;

/// Result of a committed (or skipped-as-unchanged) snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub repo_id: RepoId,
    pub status: RepoStatus,
    #[serde(flatten)]
    pub outcome: SnapshotOutcome,
}

impl FederationService {
    /// Ingests one fact batch for a repository snapshot.
    ///
    /// The whole batch validates before anything is written; a validation
    /// failure reports the offending fact, aborts the unit, and moves the
    /// repository to Failed. On success the snapshot commits atomically
    /// (unchanged files skipped wholesale) and the repository becomes
    /// Ingested. Link resolution is NOT run here -- the caller dispatches
    /// it asynchronously so ingestion never blocks on the linker.
    pub fn ingest_facts(
        &mut self,
        repo_id: RepoId,
        facts: &[Fact],
    ) -> Result<IngestReport, ApiError> {
        let repo = self.store().get_repo(repo_id)?;
        if repo.status != RepoStatus::Ingesting {
            return Err(ApiError::Conflict(format!(
                "repository {}/{} is {:?}; no import in flight",
                repo.owner, repo.repo, repo.status
            )));
        }

        let plan = match build_snapshot_plan(self.store(), repo_id, facts) {
            Ok(plan) => plan,
            Err(err @ StorageError::InvalidFact { .. }) => {
                self.store_mut()
                    .set_repo_status(repo_id, RepoStatus::Failed)?;
                tracing::warn!(repo_id = repo_id.0, error = %err, "fact batch rejected");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = self.store_mut().apply_snapshot(&plan)?;
        self.store_mut()
            .set_repo_status(repo_id, RepoStatus::Ingested)?;

        tracing::info!(
            repo_id = repo_id.0,
            files_applied = outcome.files_applied,
            files_skipped = outcome.files_skipped,
            nodes_upserted = outcome.nodes_upserted,
            nodes_tombstoned = outcome.nodes_tombstoned,
            links_declared = outcome.links_declared,
            "snapshot committed"
        );

        Ok(IngestReport {
            repo_id,
            status: RepoStatus::Ingested,
            outcome,
        })
    }
}
