//! The [`FederationStore`] trait defining the storage contract for the
//! federation graph and the patch-proposal queue.
//!
//! Two-layer API design:
//! - **Low-level CRUD** methods form the trait foundation. Every write is
//!   an idempotent upsert keyed by the identity tuples of the data model,
//!   which is what makes re-ingestion and linker re-entry safe.
//! - **High-level atomic** methods (`apply_snapshot`, `update_proposals`)
//!   commit a whole unit of work or none of it; ingestion and the
//!   conflict cascade go through these.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait with
//! identical semantics, ensuring they are fully swappable.

use fedkernel_core::{
    CrossLink, FileRecord, NodeId, PatchId, PatchProposal, PatchStatus, PendingLink,
    PendingLinkKey, RepoId, RepoStatus, Repository, SymbolNode,
};

use crate::error::StorageError;
use crate::plan::{SnapshotOutcome, SnapshotPlan};

/// Direction selector for link listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Outgoing,
    Incoming,
}

/// The storage contract for the federation graph and proposal queue.
///
/// The trait is synchronous; concurrency is handled one level up (the
/// service serializes access, the SQLite backend additionally wraps
/// multi-row writes in transactions).
pub trait FederationStore {
    // -------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------

    /// Registers a repository, allocating its stable [`RepoId`].
    ///
    /// Fails with [`StorageError::RepoExists`] if `(owner, repo)` is
    /// already registered; repositories are never deleted, only
    /// re-ingested.
    fn create_repo(
        &mut self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Repository, StorageError>;

    /// Retrieves a repository by id.
    fn get_repo(&self, repo_id: RepoId) -> Result<Repository, StorageError>;

    /// Finds a repository by its `(owner, repo)` coordinates.
    fn find_repo(&self, owner: &str, repo: &str) -> Result<Option<Repository>, StorageError>;

    /// Sets a repository's ingestion status.
    fn set_repo_status(&mut self, repo_id: RepoId, status: RepoStatus)
        -> Result<(), StorageError>;

    /// Lists all registered repositories.
    fn list_repos(&self) -> Result<Vec<Repository>, StorageError>;

    // -------------------------------------------------------------------
    // Files and nodes
    // -------------------------------------------------------------------

    /// Retrieves a file record, if present.
    fn get_file(&self, repo_id: RepoId, file_path: &str)
        -> Result<Option<FileRecord>, StorageError>;

    /// Lists all files of a repository.
    fn list_files(&self, repo_id: RepoId) -> Result<Vec<FileRecord>, StorageError>;

    /// Upserts a file record (keyed `(repo_id, file_path)`).
    fn upsert_file(&mut self, file: &FileRecord) -> Result<(), StorageError>;

    /// Retrieves a node by id, tombstoned or not.
    fn get_node(&self, node_id: NodeId) -> Result<Option<SymbolNode>, StorageError>;

    /// Upserts a node (keyed by its deterministic id); revives tombstones.
    fn upsert_node(&mut self, node: &SymbolNode) -> Result<(), StorageError>;

    /// Lists nodes of one file, optionally including tombstoned ones.
    fn list_nodes_in_file(
        &self,
        repo_id: RepoId,
        file_path: &str,
        include_tombstoned: bool,
    ) -> Result<Vec<SymbolNode>, StorageError>;

    /// Finds live nodes of a repository by symbol name.
    fn find_nodes_by_symbol(
        &self,
        repo_id: RepoId,
        name: &str,
    ) -> Result<Vec<SymbolNode>, StorageError>;

    /// Lists nodes, optionally restricted to one repository. Includes
    /// tombstoned nodes; callers filter with [`SymbolNode::is_live`].
    fn list_nodes(&self, repo_id: Option<RepoId>) -> Result<Vec<SymbolNode>, StorageError>;

    // -------------------------------------------------------------------
    // Links
    // -------------------------------------------------------------------

    /// Upserts a resolved link (keyed `(from, to, kind)`); clears any
    /// retired flag, reviving the edge.
    fn upsert_link(&mut self, link: &CrossLink) -> Result<(), StorageError>;

    /// Lists resolved links touching a node in the given direction,
    /// retired ones included; callers filter on `retired`.
    fn list_links(
        &self,
        node_id: NodeId,
        direction: LinkDirection,
    ) -> Result<Vec<CrossLink>, StorageError>;

    /// Lists every resolved link in the store.
    fn list_all_links(&self) -> Result<Vec<CrossLink>, StorageError>;

    /// Upserts a pending link record; `attempts` and `resolved` are
    /// preserved on conflict so re-ingestion does not reset the audit
    /// trail.
    fn upsert_pending_link(&mut self, link: &PendingLink) -> Result<(), StorageError>;

    /// Lists unresolved pending links targeting `(owner, repo)`.
    fn list_unresolved(
        &self,
        target_owner: &str,
        target_repo: &str,
    ) -> Result<Vec<PendingLink>, StorageError>;

    /// Lists pending links declared by nodes of the given repository,
    /// resolved ones included.
    fn list_pending_from_repo(&self, repo_id: RepoId) -> Result<Vec<PendingLink>, StorageError>;

    /// Lists every pending link record.
    fn list_all_pending(&self) -> Result<Vec<PendingLink>, StorageError>;

    /// Marks a pending link resolved (its row is kept as the audit
    /// record).
    fn mark_pending_resolved(&mut self, key: &PendingLinkKey) -> Result<(), StorageError>;

    /// Increments a pending link's failed-resolution counter.
    fn bump_pending_attempts(&mut self, key: &PendingLinkKey) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------

    /// Applies a validated snapshot plan atomically: upserts files, nodes,
    /// and pending links; tombstones nodes absent from changed files;
    /// retires their outgoing edges and reopens their pending links for
    /// re-resolution. Nothing of the plan is visible until all of it is.
    fn apply_snapshot(&mut self, plan: &SnapshotPlan) -> Result<SnapshotOutcome, StorageError>;

    // -------------------------------------------------------------------
    // Proposals
    // -------------------------------------------------------------------

    /// Inserts a new proposal.
    fn insert_proposal(&mut self, proposal: &PatchProposal) -> Result<(), StorageError>;

    /// Retrieves a proposal by id.
    fn get_proposal(&self, patch_id: PatchId) -> Result<Option<PatchProposal>, StorageError>;

    /// Overwrites the given proposals as one atomic batch; the approve
    /// conflict cascade relies on this being all-or-nothing.
    fn update_proposals(&mut self, proposals: &[PatchProposal]) -> Result<(), StorageError>;

    /// Lists proposals, optionally filtered by status, newest first.
    fn list_proposals(
        &self,
        status: Option<PatchStatus>,
    ) -> Result<Vec<PatchProposal>, StorageError>;

    /// Finds non-terminal proposals whose target sets intersect
    /// `node_ids`.
    fn find_open_proposals_touching(
        &self,
        node_ids: &[NodeId],
    ) -> Result<Vec<PatchProposal>, StorageError>;
}
