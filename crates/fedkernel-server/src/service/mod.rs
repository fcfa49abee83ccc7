//! FederationService: the single coordinator between HTTP handlers and
//! the storage layer.
//!
//! All business logic flows through [`FederationService`]; handlers are
//! thin wrappers that delegate to these methods. The service owns an
//! explicitly constructed store instance -- there is no process-global
//! graph state. Submodules split the surface per concern: fact ingestion,
//! link resolution, the patch workflow, and read-side queries.

mod ingest;
mod linker;
mod patches;
mod query;

pub use ingest::IngestReport;
pub use linker::LinkerReport;
pub use query::{GraphRow, PatchQueueRow};

use fedkernel_core::{RepoId, RepoStatus, Repository};
use fedkernel_store::{FederationStore, SqliteStore};

use crate::error::ApiError;

/// The central service coordinating ingestion, link resolution, patch
/// workflow transitions, and queries.
pub struct FederationService {
    store: SqliteStore,
}

impl FederationService {
    /// Creates a service backed by a SQLite database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self, ApiError> {
        let store = SqliteStore::new(db_path)
            .map_err(|e| ApiError::Internal(format!("failed to open store: {e}")))?;
        Ok(FederationService { store })
    }

    /// Creates a service on a unique temporary database (for testing).
    pub fn in_memory() -> Result<Self, ApiError> {
        let tmp_path = std::env::temp_dir()
            .join(format!("fedkernel_test_{}.db", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();
        Self::new(&tmp_path)
    }

    pub(crate) fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    // -----------------------------------------------------------------------
    // Repository registration
    // -----------------------------------------------------------------------

    /// Registers a repository (or finds the existing registration) and
    /// marks it Ingesting for the snapshot about to arrive.
    ///
    /// The caller must hold the ingest gate for the returned repo id; the
    /// status transition here is what makes the in-flight snapshot visible
    /// to queries.
    pub fn import_repo(
        &mut self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Repository, ApiError> {
        let mut repository = match self.store.find_repo(owner, repo)? {
            Some(existing) => existing,
            None => self.store.create_repo(owner, repo, default_branch)?,
        };
        self.store
            .set_repo_status(repository.repo_id, RepoStatus::Ingesting)?;
        repository.status = RepoStatus::Ingesting;
        tracing::info!(
            repo_id = repository.repo_id.0,
            owner,
            repo,
            "repository import accepted"
        );
        Ok(repository)
    }

    /// Retrieves a repository by id.
    pub fn get_repo(&self, repo_id: RepoId) -> Result<Repository, ApiError> {
        Ok(self.store.get_repo(repo_id)?)
    }

    /// Finds a repository by its coordinates.
    pub fn find_repo(&self, owner: &str, repo: &str) -> Result<Option<Repository>, ApiError> {
        Ok(self.store.find_repo(owner, repo)?)
    }

    /// Lists all registered repositories.
    pub fn list_repos(&self) -> Result<Vec<Repository>, ApiError> {
        Ok(self.store.list_repos()?)
    }
}
