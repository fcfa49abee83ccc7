//! In-memory implementation of [`FederationStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests, ephemeral
//! sessions, and anywhere persistence isn't needed. It stores all data in
//! HashMaps with identical semantics to the SQLite backend. Atomicity of
//! [`FederationStore::apply_snapshot`] holds trivially: a plan is only
//! applied after validation, and every step is an infallible map upsert,
//! so partial application cannot occur.

use std::collections::HashMap;

use fedkernel_core::{
    CrossLink, FileRecord, NodeId, PatchId, PatchProposal, PatchStatus, PendingLink,
    PendingLinkKey, RepoId, RepoStatus, Repository, SymbolNode,
};

use crate::error::StorageError;
use crate::plan::{SnapshotOutcome, SnapshotPlan};
use crate::traits::{FederationStore, LinkDirection};

/// In-memory implementation of [`FederationStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    repos: HashMap<RepoId, Repository>,
    repo_index: HashMap<(String, String), RepoId>,
    files: HashMap<(RepoId, String), FileRecord>,
    nodes: HashMap<NodeId, SymbolNode>,
    links: HashMap<(NodeId, NodeId, String), CrossLink>,
    pending: HashMap<PendingLinkKey, PendingLink>,
    proposals: HashMap<PatchId, PatchProposal>,
    next_repo_id: i64,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        InMemoryStore {
            next_repo_id: 1,
            ..Default::default()
        }
    }

    fn upsert_pending_preserving_audit(&mut self, link: &PendingLink) {
        let key = link.key();
        match self.pending.get_mut(&key) {
            Some(existing) => {
                // Keep attempts and resolved: re-ingestion must not reset
                // the audit trail.
                existing.hint_path = link.hint_path.clone();
                existing.kind = link.kind.clone();
                existing.weight = link.weight;
                existing.notes = link.notes.clone();
            }
            None => {
                self.pending.insert(key, link.clone());
            }
        }
    }
}

impl FederationStore for InMemoryStore {
    // -------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------

    fn create_repo(
        &mut self,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<Repository, StorageError> {
        let index_key = (owner.to_string(), repo.to_string());
        if self.repo_index.contains_key(&index_key) {
            return Err(StorageError::RepoExists {
                owner: owner.to_string(),
                repo: repo.to_string(),
            });
        }
        let repo_id = RepoId(self.next_repo_id);
        self.next_repo_id += 1;
        let repository = Repository {
            repo_id,
            owner: owner.to_string(),
            repo: repo.to_string(),
            default_branch: default_branch.to_string(),
            status: RepoStatus::Pending,
        };
        self.repos.insert(repo_id, repository.clone());
        self.repo_index.insert(index_key, repo_id);
        Ok(repository)
    }

    fn get_repo(&self, repo_id: RepoId) -> Result<Repository, StorageError> {
        self.repos
            .get(&repo_id)
            .cloned()
            .ok_or(StorageError::RepoNotFound(repo_id))
    }

    fn find_repo(&self, owner: &str, repo: &str) -> Result<Option<Repository>, StorageError> {
        let key = (owner.to_string(), repo.to_string());
        Ok(self
            .repo_index
            .get(&key)
            .and_then(|id| self.repos.get(id))
            .cloned())
    }

    fn set_repo_status(
        &mut self,
        repo_id: RepoId,
        status: RepoStatus,
    ) -> Result<(), StorageError> {
        let repo = self
            .repos
            .get_mut(&repo_id)
            .ok_or(StorageError::RepoNotFound(repo_id))?;
        repo.status = status;
        Ok(())
    }

    fn list_repos(&self) -> Result<Vec<Repository>, StorageError> {
        let mut repos: Vec<Repository> = self.repos.values().cloned().collect();
        repos.sort_by_key(|r| r.repo_id);
        Ok(repos)
    }

    // -------------------------------------------------------------------
    // Files and nodes
    // -------------------------------------------------------------------

    fn get_file(
        &self,
        repo_id: RepoId,
        file_path: &str,
    ) -> Result<Option<FileRecord>, StorageError> {
        Ok(self
            .files
            .get(&(repo_id, file_path.to_string()))
            .cloned())
    }

    fn list_files(&self, repo_id: RepoId) -> Result<Vec<FileRecord>, StorageError> {
        let mut files: Vec<FileRecord> = self
            .files
            .values()
            .filter(|f| f.repo_id == repo_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(files)
    }

    fn upsert_file(&mut self, file: &FileRecord) -> Result<(), StorageError> {
        self.files
            .insert((file.repo_id, file.file_path.clone()), file.clone());
        Ok(())
    }

    fn get_node(&self, node_id: NodeId) -> Result<Option<SymbolNode>, StorageError> {
        Ok(self.nodes.get(&node_id).cloned())
    }

    fn upsert_node(&mut self, node: &SymbolNode) -> Result<(), StorageError> {
        self.nodes.insert(node.node_id, node.clone());
        Ok(())
    }

    fn list_nodes_in_file(
        &self,
        repo_id: RepoId,
        file_path: &str,
        include_tombstoned: bool,
    ) -> Result<Vec<SymbolNode>, StorageError> {
        let mut nodes: Vec<SymbolNode> = self
            .nodes
            .values()
            .filter(|n| n.repo_id == repo_id && n.file_path == file_path)
            .filter(|n| include_tombstoned || n.is_live())
            .cloned()
            .collect();
        nodes.sort_by(|a, b| (&a.name, &a.kind).cmp(&(&b.name, &b.kind)));
        Ok(nodes)
    }

    fn find_nodes_by_symbol(
        &self,
        repo_id: RepoId,
        name: &str,
    ) -> Result<Vec<SymbolNode>, StorageError> {
        let mut nodes: Vec<SymbolNode> = self
            .nodes
            .values()
            .filter(|n| n.repo_id == repo_id && n.name == name && n.is_live())
            .cloned()
            .collect();
        nodes.sort_by(|a, b| (&a.file_path, &a.kind).cmp(&(&b.file_path, &b.kind)));
        Ok(nodes)
    }

    fn list_nodes(&self, repo_id: Option<RepoId>) -> Result<Vec<SymbolNode>, StorageError> {
        let mut nodes: Vec<SymbolNode> = self
            .nodes
            .values()
            .filter(|n| repo_id.is_none_or(|id| n.repo_id == id))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| {
            (a.repo_id, &a.file_path, &a.name, &a.kind).cmp(&(
                b.repo_id,
                &b.file_path,
                &b.name,
                &b.kind,
            ))
        });
        Ok(nodes)
    }

    // -------------------------------------------------------------------
    // Links
    // -------------------------------------------------------------------

    fn upsert_link(&mut self, link: &CrossLink) -> Result<(), StorageError> {
        let mut revived = link.clone();
        revived.retired = false;
        self.links
            .insert((link.from, link.to, link.kind.clone()), revived);
        Ok(())
    }

    fn list_links(
        &self,
        node_id: NodeId,
        direction: LinkDirection,
    ) -> Result<Vec<CrossLink>, StorageError> {
        let mut links: Vec<CrossLink> = self
            .links
            .values()
            .filter(|l| match direction {
                LinkDirection::Outgoing => l.from == node_id,
                LinkDirection::Incoming => l.to == node_id,
            })
            .cloned()
            .collect();
        links.sort_by(|a, b| (a.from, a.to, &a.kind).cmp(&(b.from, b.to, &b.kind)));
        Ok(links)
    }

    fn list_all_links(&self) -> Result<Vec<CrossLink>, StorageError> {
        let mut links: Vec<CrossLink> = self.links.values().cloned().collect();
        links.sort_by(|a, b| (a.from, a.to, &a.kind).cmp(&(b.from, b.to, &b.kind)));
        Ok(links)
    }

    fn upsert_pending_link(&mut self, link: &PendingLink) -> Result<(), StorageError> {
        self.upsert_pending_preserving_audit(link);
        Ok(())
    }

    fn list_unresolved(
        &self,
        target_owner: &str,
        target_repo: &str,
    ) -> Result<Vec<PendingLink>, StorageError> {
        let mut links: Vec<PendingLink> = self
            .pending
            .values()
            .filter(|p| {
                !p.resolved && p.target_owner == target_owner && p.target_repo == target_repo
            })
            .cloned()
            .collect();
        links.sort_by(|a, b| (a.from, &a.target_symbol).cmp(&(b.from, &b.target_symbol)));
        Ok(links)
    }

    fn list_pending_from_repo(&self, repo_id: RepoId) -> Result<Vec<PendingLink>, StorageError> {
        let mut links: Vec<PendingLink> = self
            .pending
            .values()
            .filter(|p| {
                self.nodes
                    .get(&p.from)
                    .is_some_and(|n| n.repo_id == repo_id)
            })
            .cloned()
            .collect();
        links.sort_by(|a, b| (a.from, &a.target_symbol).cmp(&(b.from, &b.target_symbol)));
        Ok(links)
    }

    fn list_all_pending(&self) -> Result<Vec<PendingLink>, StorageError> {
        let mut links: Vec<PendingLink> = self.pending.values().cloned().collect();
        links.sort_by(|a, b| (a.from, &a.target_symbol).cmp(&(b.from, &b.target_symbol)));
        Ok(links)
    }

    fn mark_pending_resolved(&mut self, key: &PendingLinkKey) -> Result<(), StorageError> {
        if let Some(pending) = self.pending.get_mut(key) {
            pending.resolved = true;
        }
        Ok(())
    }

    fn bump_pending_attempts(&mut self, key: &PendingLinkKey) -> Result<(), StorageError> {
        if let Some(pending) = self.pending.get_mut(key) {
            pending.attempts += 1;
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------

    fn apply_snapshot(&mut self, plan: &SnapshotPlan) -> Result<SnapshotOutcome, StorageError> {
        let mut outcome = SnapshotOutcome {
            files_skipped: plan.skipped.len(),
            ..Default::default()
        };

        for file_plan in &plan.files {
            self.files.insert(
                (file_plan.file.repo_id, file_plan.file.file_path.clone()),
                file_plan.file.clone(),
            );
            outcome.files_applied += 1;

            for node in &file_plan.nodes {
                self.nodes.insert(node.node_id, node.clone());
                outcome.nodes_upserted += 1;
            }

            for node_id in &file_plan.tombstoned {
                if let Some(node) = self.nodes.get_mut(node_id) {
                    node.tombstoned = true;
                }
                // Retire the dead node's outgoing edges and reopen its
                // pending records so a revived node re-resolves.
                for link in self.links.values_mut().filter(|l| l.from == *node_id) {
                    link.retired = true;
                }
                for pending in self.pending.values_mut().filter(|p| p.from == *node_id) {
                    pending.resolved = false;
                }
                outcome.nodes_tombstoned += 1;
            }

            for pending in &file_plan.pending_links {
                self.upsert_pending_preserving_audit(pending);
                outcome.links_declared += 1;
            }
        }

        for pending in &plan.loose_links {
            self.upsert_pending_preserving_audit(pending);
            outcome.links_declared += 1;
        }

        Ok(outcome)
    }

    // -------------------------------------------------------------------
    // Proposals
    // -------------------------------------------------------------------

    fn insert_proposal(&mut self, proposal: &PatchProposal) -> Result<(), StorageError> {
        self.proposals
            .insert(proposal.patch_id, proposal.clone());
        Ok(())
    }

    fn get_proposal(&self, patch_id: PatchId) -> Result<Option<PatchProposal>, StorageError> {
        Ok(self.proposals.get(&patch_id).cloned())
    }

    fn update_proposals(&mut self, proposals: &[PatchProposal]) -> Result<(), StorageError> {
        for proposal in proposals {
            if !self.proposals.contains_key(&proposal.patch_id) {
                return Err(StorageError::ProposalNotFound(proposal.patch_id));
            }
        }
        for proposal in proposals {
            self.proposals
                .insert(proposal.patch_id, proposal.clone());
        }
        Ok(())
    }

    fn list_proposals(
        &self,
        status: Option<PatchStatus>,
    ) -> Result<Vec<PatchProposal>, StorageError> {
        let mut proposals: Vec<PatchProposal> = self
            .proposals
            .values()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        proposals.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.patch_id.0.cmp(&b.patch_id.0))
        });
        Ok(proposals)
    }

    fn find_open_proposals_touching(
        &self,
        node_ids: &[NodeId],
    ) -> Result<Vec<PatchProposal>, StorageError> {
        let mut proposals: Vec<PatchProposal> = self
            .proposals
            .values()
            .filter(|p| !p.status.is_terminal() && p.targets_overlap(node_ids))
            .cloned()
            .collect();
        proposals.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.patch_id.0.cmp(&b.patch_id.0))
        });
        Ok(proposals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::node_id_for;
    use crate::plan::build_snapshot_plan;
    use fedkernel_core::{Fact, NodeRef};

    fn ingest(store: &mut InMemoryStore, repo_id: RepoId, facts: &[Fact]) -> SnapshotOutcome {
        let plan = build_snapshot_plan(store, repo_id, facts).unwrap();
        store.apply_snapshot(&plan).unwrap()
    }

    fn batch_with_link() -> Vec<Fact> {
        vec![
            Fact::FileDeclared {
                file_path: "f.py".into(),
            },
            Fact::NodeDeclared {
                file_path: "f.py".into(),
                name: "foo".into(),
                kind: "function".into(),
                span: None,
            },
            Fact::LinkDeclared {
                from: NodeRef {
                    file_path: "f.py".into(),
                    name: "foo".into(),
                    kind: "function".into(),
                },
                target_owner: "acme".into(),
                target_repo: "util".into(),
                target_symbol: "helper".into(),
                hint_path: None,
                kind: "calls".into(),
                weight: 1.0,
                notes: String::new(),
            },
        ]
    }

    #[test]
    fn repo_registration_is_unique() {
        let mut store = InMemoryStore::new();
        let first = store.create_repo("acme", "kernel", "main").unwrap();
        assert_eq!(first.status, RepoStatus::Pending);
        assert!(matches!(
            store.create_repo("acme", "kernel", "main"),
            Err(StorageError::RepoExists { .. })
        ));
        assert_eq!(
            store.find_repo("acme", "kernel").unwrap().unwrap().repo_id,
            first.repo_id
        );
    }

    #[test]
    fn reingesting_identical_batch_is_a_no_op() {
        let mut store = InMemoryStore::new();
        let repo_id = store.create_repo("acme", "kernel", "main").unwrap().repo_id;

        let first = ingest(&mut store, repo_id, &batch_with_link());
        assert_eq!(first.files_applied, 1);
        assert_eq!(first.nodes_upserted, 1);

        let nodes_before = store.list_nodes(Some(repo_id)).unwrap();
        let pending_before = store.list_all_pending().unwrap();

        let second = ingest(&mut store, repo_id, &batch_with_link());
        assert_eq!(second.files_applied, 0);
        assert_eq!(second.files_skipped, 1);
        assert_eq!(second.nodes_upserted, 0);

        assert_eq!(
            store.list_nodes(Some(repo_id)).unwrap().len(),
            nodes_before.len()
        );
        assert_eq!(store.list_all_pending().unwrap().len(), pending_before.len());
    }

    #[test]
    fn pending_upsert_preserves_attempts_and_resolution() {
        let mut store = InMemoryStore::new();
        let repo_id = store.create_repo("acme", "kernel", "main").unwrap().repo_id;
        ingest(&mut store, repo_id, &batch_with_link());

        let pending = store.list_unresolved("acme", "util").unwrap();
        assert_eq!(pending.len(), 1);
        let key = pending[0].key();

        store.bump_pending_attempts(&key).unwrap();
        store.bump_pending_attempts(&key).unwrap();

        // Re-declare with different notes: audit fields survive.
        let mut updated = pending[0].clone();
        updated.notes = "seen again".into();
        updated.attempts = 0;
        store.upsert_pending_link(&updated).unwrap();

        let after = store.list_unresolved("acme", "util").unwrap();
        assert_eq!(after[0].attempts, 2);
        assert_eq!(after[0].notes, "seen again");
    }

    #[test]
    fn tombstoning_retires_edges_and_reopens_pending() {
        let mut store = InMemoryStore::new();
        let repo_id = store.create_repo("acme", "kernel", "main").unwrap().repo_id;
        ingest(&mut store, repo_id, &batch_with_link());

        let foo = node_id_for(repo_id, "f.py", "foo", "function");
        let other = node_id_for(repo_id, "g.py", "target", "function");

        // Simulate a resolved edge from foo.
        store
            .upsert_link(&CrossLink {
                from: foo,
                to: other,
                kind: "calls".into(),
                weight: 1.0,
                notes: String::new(),
                retired: false,
            })
            .unwrap();
        let key = store.list_unresolved("acme", "util").unwrap()[0].key();
        store.mark_pending_resolved(&key).unwrap();

        // Re-ingest without foo.
        let shrunk = vec![Fact::FileDeclared {
            file_path: "f.py".into(),
        }];
        ingest(&mut store, repo_id, &shrunk);

        let node = store.get_node(foo).unwrap().unwrap();
        assert!(node.tombstoned);
        let links = store.list_links(foo, LinkDirection::Outgoing).unwrap();
        assert!(links.iter().all(|l| l.retired));
        // The pending record is open again, ready for re-resolution if the
        // node revives.
        assert_eq!(store.list_unresolved("acme", "util").unwrap().len(), 1);
    }

    #[test]
    fn update_proposals_requires_known_ids() {
        let mut store = InMemoryStore::new();
        let missing = PatchProposal {
            patch_id: PatchId::new(),
            repo_id: RepoId(1),
            owner: "acme".into(),
            repo: "kernel".into(),
            file_path: "f.py".into(),
            target_node_ids: vec![],
            actor: "alice".into(),
            status: PatchStatus::Proposed,
            conflicts_with: vec![],
            created_at: 0,
            reviewed_by: None,
            decided_at: None,
            decided_by: None,
        };
        assert!(matches!(
            store.update_proposals(std::slice::from_ref(&missing)),
            Err(StorageError::ProposalNotFound(_))
        ));
    }
}
