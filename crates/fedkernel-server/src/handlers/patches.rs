//! Patch workflow handlers.
//!
//! Lock ordering: handlers that mutate proposal state acquire the
//! node-set lock for the affected targets first, then the service lock.
//! Read-only handlers take the service lock alone.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use fedkernel_core::{DecideOutcome, NodeId, PatchId, PatchStatus};

use crate::error::ApiError;
use crate::schema::patches::{
    CreatePatchRequest, DecideRequest, DecideResponse, PatchQueueParams, PatchQueueResponse,
    PatchView, ReviewRequest,
};
use crate::state::AppState;
use crate::time_fmt::now_epoch_secs;

fn parse_targets(hex_ids: &[String]) -> Result<Vec<NodeId>, ApiError> {
    hex_ids
        .iter()
        .map(|hex| NodeId::parse_hex(hex).map_err(ApiError::from))
        .collect()
}

/// `POST /federation/patches`
pub async fn create_patch(
    State(state): State<AppState>,
    Json(req): Json<CreatePatchRequest>,
) -> Result<(StatusCode, Json<PatchView>), ApiError> {
    let targets = parse_targets(&req.target_node_ids)?;

    let _guard = state.patch_locks.acquire(&targets).await;
    let mut service = state.service.lock().await;
    let proposal = service.propose(
        &req.owner,
        &req.repo,
        &req.file_path,
        targets,
        &req.actor,
        now_epoch_secs(),
    )?;
    Ok((StatusCode::CREATED, Json(PatchView::from(proposal))))
}

/// `POST /federation/patches/{patch_id}/review`
pub async fn review_patch(
    State(state): State<AppState>,
    Path(patch_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<PatchView>, ApiError> {
    let mut service = state.service.lock().await;
    let proposal = service.review(PatchId(patch_id), &req.actor)?;
    Ok(Json(PatchView::from(proposal)))
}

/// `POST /federation/patches/{patch_id}/decide`
pub async fn decide_patch(
    State(state): State<AppState>,
    Path(patch_id): Path<Uuid>,
    Json(req): Json<DecideRequest>,
) -> Result<Json<DecideResponse>, ApiError> {
    let patch_id = PatchId(patch_id);
    let outcome = DecideOutcome::parse(&req.outcome)?;

    // Read the immutable target set first, then enter the node-scoped
    // critical section for the decision itself.
    let targets = {
        let service = state.service.lock().await;
        service.proposal_targets(patch_id)?
    };
    let _guard = state.patch_locks.acquire(&targets).await;
    let mut service = state.service.lock().await;
    let (decided, cascade) = service.decide(
        patch_id,
        outcome,
        req.actor.as_deref(),
        now_epoch_secs(),
    )?;

    Ok(Json(DecideResponse {
        patch_id: decided.patch_id,
        status: decided.status,
        conflicts_with: decided.conflicts_with,
        conflicted: cascade.into_iter().map(|p| p.patch_id).collect(),
    }))
}

/// `POST /federation/patches/{patch_id}/withdraw`
pub async fn withdraw_patch(
    State(state): State<AppState>,
    Path(patch_id): Path<Uuid>,
) -> Result<Json<PatchView>, ApiError> {
    let patch_id = PatchId(patch_id);
    let targets = {
        let service = state.service.lock().await;
        service.proposal_targets(patch_id)?
    };
    let _guard = state.patch_locks.acquire(&targets).await;
    let mut service = state.service.lock().await;
    let proposal = service.withdraw(patch_id, now_epoch_secs())?;
    Ok(Json(PatchView::from(proposal)))
}

/// `GET /federation/patches?status=`
pub async fn list_patches(
    State(state): State<AppState>,
    Query(params): Query<PatchQueueParams>,
) -> Result<Json<PatchQueueResponse>, ApiError> {
    let status = match params.status.as_deref() {
        Some(s) => Some(PatchStatus::parse(s)?),
        None => None,
    };
    let service = state.service.lock().await;
    let patches = service.patch_queue_view(status)?;
    Ok(Json(PatchQueueResponse { patches }))
}

/// `GET /federation/patches/{patch_id}`
pub async fn get_patch(
    State(state): State<AppState>,
    Path(patch_id): Path<Uuid>,
) -> Result<Json<PatchView>, ApiError> {
    let service = state.service.lock().await;
    let proposal = service.require_proposal(PatchId(patch_id))?;
    Ok(Json(PatchView::from(proposal)))
}
