//! Cross-repository links, resolved and pending.

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// A resolved directed edge between two nodes, keyed `(from, to, kind)`.
///
/// `weight` and `notes` ride along from the declaring fact. `retired`
/// marks edges whose from-node was tombstoned; retired edges are kept for
/// audit and leave the live graph, and are revived by the same upsert if
/// the node comes back with the same links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossLink {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: String,
    pub weight: f64,
    pub notes: String,
    pub retired: bool,
}

/// Natural key of a pending link record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingLinkKey {
    pub from: NodeId,
    pub target_owner: String,
    pub target_repo: String,
    pub target_symbol: String,
}

/// A cross-repository reference whose target is not yet (or no longer)
/// resolvable against the graph.
///
/// Created during ingestion from `link_declared` facts; the linker turns
/// pending links into [`CrossLink`]s when the target repository has a
/// matching live node. A resolved pending link keeps its row as the audit
/// record of where the edge came from. `attempts` counts resolution passes
/// that found no match -- a link that never resolves is a steady state,
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingLink {
    pub from: NodeId,
    pub target_owner: String,
    pub target_repo: String,
    pub target_symbol: String,
    /// Optional file path the extractor believed the target lives in;
    /// used as the tie-break when several nodes share the symbol name.
    pub hint_path: Option<String>,
    pub kind: String,
    pub weight: f64,
    pub notes: String,
    pub attempts: u32,
    pub resolved: bool,
}

impl PendingLink {
    /// The record's natural key.
    pub fn key(&self) -> PendingLinkKey {
        PendingLinkKey {
            from: self.from,
            target_owner: self.target_owner.clone(),
            target_repo: self.target_repo.clone(),
            target_symbol: self.target_symbol.clone(),
        }
    }
}
