//! Graph query handlers.

use axum::extract::{Query, State};
use axum::Json;

use fedkernel_core::RepoId;

use crate::error::ApiError;
use crate::schema::graph::{
    GraphQueryParams, GraphQueryResponse, GraphScanResponse, PendingLinkView, UnresolvedParams,
    UnresolvedResponse,
};
use crate::state::AppState;

/// `GET /federation/graph/query?repo_id=&file_path=`
pub async fn query_graph(
    State(state): State<AppState>,
    Query(params): Query<GraphQueryParams>,
) -> Result<Json<GraphQueryResponse>, ApiError> {
    let service = state.service.lock().await;
    let rows = service.graph_view(
        params.repo_id.map(RepoId),
        params.file_path.as_deref(),
    )?;
    Ok(Json(GraphQueryResponse { rows }))
}

/// `GET /federation/graph/scan`
pub async fn scan_graph(
    State(state): State<AppState>,
) -> Result<Json<GraphScanResponse>, ApiError> {
    let service = state.service.lock().await;
    let summary = service.graph_scan()?;
    Ok(Json(GraphScanResponse { summary }))
}

/// `GET /federation/graph/unresolved?owner=&repo=`
pub async fn list_unresolved(
    State(state): State<AppState>,
    Query(params): Query<UnresolvedParams>,
) -> Result<Json<UnresolvedResponse>, ApiError> {
    let service = state.service.lock().await;
    let links = service
        .unresolved_links(&params.owner, &params.repo)?
        .into_iter()
        .map(|p| PendingLinkView {
            from_node_id: p.from,
            target_owner: p.target_owner,
            target_repo: p.target_repo,
            target_symbol: p.target_symbol,
            hint_path: p.hint_path,
            kind: p.kind,
            attempts: p.attempts,
        })
        .collect();
    Ok(Json(UnresolvedResponse { links }))
}
