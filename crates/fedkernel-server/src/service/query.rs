//! Read-side composition of graph and proposal state.
//!
//! No mutation: every method reads under the service lock, which gives
//! callers a consistent snapshot without blocking writers for longer than
//! the read itself.

use serde::Serialize;

use fedkernel_core::{
    GraphSummary, NodeId, PatchId, PatchStatus, PendingLink, RepoId,
};
use fedkernel_store::traits::LinkDirection;
use fedkernel_store::FederationStore;

use crate::error::ApiError;
use crate::service::FederationService;

/// One row of the graph query: a live node joined with one outgoing
/// resolved link (or none).
#[derive(Debug, Clone, Serialize)]
pub struct GraphRow {
    pub node_id: NodeId,
    pub repo_id: RepoId,
    pub file_path: String,
    pub name: String,
    pub kind: String,
    /// Name of the linked-to node; null for nodes without outgoing links.
    pub cross_linked_to: Option<String>,
    pub link_kind: Option<String>,
    pub weight: Option<f64>,
    pub notes: Option<String>,
}

/// One row of the patch queue view.
#[derive(Debug, Clone, Serialize)]
pub struct PatchQueueRow {
    pub patch_id: PatchId,
    pub owner: String,
    pub repo: String,
    pub file_path: String,
    pub actor: String,
    pub status: PatchStatus,
    pub conflicts_with: Vec<PatchId>,
    pub created_at: String,
    /// True when any target node is tombstoned or gone: the proposal is
    /// still valid by id but no longer matches the live graph.
    pub stale: bool,
}

impl FederationService {
    /// Live nodes joined with their outgoing resolved links.
    pub fn graph_view(
        &self,
        repo_id: Option<RepoId>,
        file_path: Option<&str>,
    ) -> Result<Vec<GraphRow>, ApiError> {
        let store = self.store();
        let nodes = store.list_nodes(repo_id)?;
        let mut rows = Vec::new();

        for node in nodes.iter().filter(|n| n.is_live()) {
            if let Some(path) = file_path {
                if node.file_path != path {
                    continue;
                }
            }
            let links = store.list_links(node.node_id, LinkDirection::Outgoing)?;
            let live_links: Vec<_> = links.into_iter().filter(|l| !l.retired).collect();
            if live_links.is_empty() {
                rows.push(GraphRow {
                    node_id: node.node_id,
                    repo_id: node.repo_id,
                    file_path: node.file_path.clone(),
                    name: node.name.clone(),
                    kind: node.kind.clone(),
                    cross_linked_to: None,
                    link_kind: None,
                    weight: None,
                    notes: None,
                });
                continue;
            }
            for link in live_links {
                let target_name = store.get_node(link.to)?.map(|n| n.name);
                rows.push(GraphRow {
                    node_id: node.node_id,
                    repo_id: node.repo_id,
                    file_path: node.file_path.clone(),
                    name: node.name.clone(),
                    kind: node.kind.clone(),
                    cross_linked_to: target_name,
                    link_kind: Some(link.kind),
                    weight: Some(link.weight),
                    notes: Some(link.notes),
                });
            }
        }
        Ok(rows)
    }

    /// Whole-graph summary: per-repo counts plus connectivity of the live
    /// projection.
    pub fn graph_scan(&self) -> Result<GraphSummary, ApiError> {
        let store = self.store();
        let repos = store.list_repos()?;
        let nodes = store.list_nodes(None)?;
        let links = store.list_all_links()?;

        let mut pending_pairs: Vec<(RepoId, bool)> = Vec::new();
        for pending in store.list_all_pending()? {
            if let Some(source) = store.get_node(pending.from)? {
                pending_pairs.push((source.repo_id, pending.resolved));
            }
        }

        Ok(GraphSummary::assemble(
            &repos,
            &nodes,
            &links,
            &pending_pairs,
        ))
    }

    /// Unresolved pending links targeting `(owner, repo)`.
    pub fn unresolved_links(
        &self,
        target_owner: &str,
        target_repo: &str,
    ) -> Result<Vec<PendingLink>, ApiError> {
        Ok(self.store().list_unresolved(target_owner, target_repo)?)
    }

    /// Proposals joined with staleness against the live graph.
    pub fn patch_queue_view(
        &self,
        status: Option<PatchStatus>,
    ) -> Result<Vec<PatchQueueRow>, ApiError> {
        let store = self.store();
        let proposals = store.list_proposals(status)?;
        let mut rows = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            let stale = self.targets_stale(&proposal.target_node_ids)?;
            rows.push(PatchQueueRow {
                patch_id: proposal.patch_id,
                owner: proposal.owner,
                repo: proposal.repo,
                file_path: proposal.file_path,
                actor: proposal.actor,
                status: proposal.status,
                conflicts_with: proposal.conflicts_with,
                created_at: crate::time_fmt::format_epoch_secs(proposal.created_at),
                stale,
            });
        }
        Ok(rows)
    }

    /// True when any target id no longer resolves to a live node.
    pub fn targets_stale(&self, target_node_ids: &[NodeId]) -> Result<bool, ApiError> {
        for node_id in target_node_ids {
            let live = self
                .store()
                .get_node(*node_id)?
                .map(|n| n.is_live())
                .unwrap_or(false);
            if !live {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
