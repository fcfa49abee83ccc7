//! Schema types for graph queries.

use serde::{Deserialize, Serialize};

use fedkernel_core::{GraphSummary, NodeId};

use crate::service::GraphRow;

/// Query parameters for `GET /federation/graph/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQueryParams {
    pub repo_id: Option<i64>,
    pub file_path: Option<String>,
}

/// Response for the graph query: one row per node/outgoing-link pair.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQueryResponse {
    pub rows: Vec<GraphRow>,
}

/// Response for the whole-graph scan.
#[derive(Debug, Clone, Serialize)]
pub struct GraphScanResponse {
    #[serde(flatten)]
    pub summary: GraphSummary,
}

/// Query parameters for `GET /federation/graph/unresolved`.
#[derive(Debug, Clone, Deserialize)]
pub struct UnresolvedParams {
    pub owner: String,
    pub repo: String,
}

/// One unresolved pending link.
#[derive(Debug, Clone, Serialize)]
pub struct PendingLinkView {
    pub from_node_id: NodeId,
    pub target_owner: String,
    pub target_repo: String,
    pub target_symbol: String,
    pub hint_path: Option<String>,
    pub kind: String,
    pub attempts: u32,
}

/// Response listing unresolved links for a target repository.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedResponse {
    pub links: Vec<PendingLinkView>,
}
