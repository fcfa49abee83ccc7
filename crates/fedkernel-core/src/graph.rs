//! Read-side projection of the federation graph.
//!
//! The persistent graph is relational (keyed for idempotent upsert); this
//! module builds an in-memory petgraph view of the live nodes and links
//! for whole-graph queries -- currently the scan summary's connectivity
//! numbers. The projection is rebuilt per query and never mutated in
//! place.

use indexmap::IndexMap;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;

use crate::id::{NodeId, RepoId};
use crate::link::CrossLink;
use crate::node::SymbolNode;
use crate::repo::{RepoStatus, Repository};

/// In-memory directed view over live nodes and resolved links.
#[derive(Debug, Default)]
pub struct FederationGraph {
    inner: DiGraphMap<NodeId, ()>,
}

impl FederationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the projection from live nodes and non-retired links.
    ///
    /// Tombstoned nodes and retired edges are excluded; an edge whose
    /// endpoint is not among the given nodes is skipped rather than
    /// materializing a phantom node.
    pub fn project(nodes: &[SymbolNode], links: &[CrossLink]) -> Self {
        let mut graph = DiGraphMap::new();
        for node in nodes.iter().filter(|n| n.is_live()) {
            graph.add_node(node.node_id);
        }
        for link in links.iter().filter(|l| !l.retired) {
            if graph.contains_node(link.from) && graph.contains_node(link.to) {
                graph.add_edge(link.from, link.to, ());
            }
        }
        FederationGraph { inner: graph }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Number of weakly connected components.
    pub fn component_count(&self) -> usize {
        petgraph::algo::connected_components(&self.inner)
    }

    /// Outgoing neighbors of a node, in the projection.
    pub fn neighbors_out(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .neighbors_directed(id, petgraph::Direction::Outgoing)
            .collect()
    }
}

/// Per-repository slice of the scan summary.
#[derive(Debug, Clone, Serialize)]
pub struct RepoGraphStats {
    pub repo_id: RepoId,
    pub owner: String,
    pub repo: String,
    pub status: RepoStatus,
    pub nodes: usize,
    pub outgoing_links: usize,
    pub pending_links: usize,
}

/// Whole-graph summary returned by the scan endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub repositories: usize,
    pub nodes: usize,
    pub resolved_links: usize,
    pub pending_links: usize,
    pub components: usize,
    pub repos: Vec<RepoGraphStats>,
}

impl GraphSummary {
    /// Assembles the summary from store-level listings.
    ///
    /// `pending` carries `(from_repo_id, resolved)` pairs so the summary
    /// counts only still-open pending links, attributed to the repository
    /// that declared them.
    pub fn assemble(
        repositories: &[Repository],
        nodes: &[SymbolNode],
        links: &[CrossLink],
        pending: &[(RepoId, bool)],
    ) -> Self {
        let projection = FederationGraph::project(nodes, links);

        let mut per_repo: IndexMap<RepoId, RepoGraphStats> = repositories
            .iter()
            .map(|r| {
                (
                    r.repo_id,
                    RepoGraphStats {
                        repo_id: r.repo_id,
                        owner: r.owner.clone(),
                        repo: r.repo.clone(),
                        status: r.status,
                        nodes: 0,
                        outgoing_links: 0,
                        pending_links: 0,
                    },
                )
            })
            .collect();

        for node in nodes.iter().filter(|n| n.is_live()) {
            if let Some(stats) = per_repo.get_mut(&node.repo_id) {
                stats.nodes += 1;
                stats.outgoing_links += projection.neighbors_out(node.node_id).len();
            }
        }

        let mut open_pending = 0;
        for (repo_id, resolved) in pending {
            if !resolved {
                open_pending += 1;
                if let Some(stats) = per_repo.get_mut(repo_id) {
                    stats.pending_links += 1;
                }
            }
        }

        GraphSummary {
            repositories: repositories.len(),
            nodes: projection.node_count(),
            resolved_links: projection.edge_count(),
            pending_links: open_pending,
            components: projection.component_count(),
            repos: per_repo.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nid(seed: u8) -> NodeId {
        NodeId::from_bytes([seed; 32])
    }

    fn node(seed: u8, repo: i64, tombstoned: bool) -> SymbolNode {
        SymbolNode {
            node_id: nid(seed),
            repo_id: RepoId(repo),
            file_path: "f.py".into(),
            name: format!("sym{seed}"),
            kind: "function".into(),
            span: None,
            tombstoned,
        }
    }

    fn link(from: u8, to: u8, retired: bool) -> CrossLink {
        CrossLink {
            from: nid(from),
            to: nid(to),
            kind: "calls".into(),
            weight: 1.0,
            notes: String::new(),
            retired,
        }
    }

    #[test]
    fn projection_skips_tombstones_and_retired_edges() {
        let nodes = vec![node(1, 1, false), node(2, 1, false), node(3, 1, true)];
        let links = vec![link(1, 2, false), link(1, 3, false), link(2, 1, true)];
        let graph = FederationGraph::project(&nodes, &links);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.neighbors_out(nid(1)), vec![nid(2)]);
    }

    #[test]
    fn component_count_over_disconnected_nodes() {
        let nodes = vec![node(1, 1, false), node(2, 1, false), node(3, 2, false)];
        let links = vec![link(1, 2, false)];
        let graph = FederationGraph::project(&nodes, &links);
        assert_eq!(graph.component_count(), 2);
    }

    #[test]
    fn summary_attributes_pending_links() {
        let repos = vec![
            Repository {
                repo_id: RepoId(1),
                owner: "acme".into(),
                repo: "a".into(),
                default_branch: "main".into(),
                status: RepoStatus::Ingested,
            },
            Repository {
                repo_id: RepoId(2),
                owner: "acme".into(),
                repo: "b".into(),
                default_branch: "main".into(),
                status: RepoStatus::Ingested,
            },
        ];
        let nodes = vec![node(1, 1, false), node(2, 2, false)];
        let links = vec![];
        let pending = vec![(RepoId(1), false), (RepoId(1), true), (RepoId(2), false)];

        let summary = GraphSummary::assemble(&repos, &nodes, &links, &pending);
        assert_eq!(summary.pending_links, 2);
        assert_eq!(summary.repos[0].pending_links, 1);
        assert_eq!(summary.repos[1].pending_links, 1);
        assert_eq!(summary.components, 2);
    }
}
