//! Repository import and fact ingestion handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use fedkernel_core::RepoId;

use crate::error::ApiError;
use crate::schema::repos::{
    ImportRepoRequest, ImportRepoResponse, IngestResponse, RepoListResponse, RepoView,
    SubmitFactsRequest,
};
use crate::state::AppState;

fn repo_view(repo: fedkernel_core::Repository) -> RepoView {
    RepoView {
        repo_id: repo.repo_id,
        owner: repo.owner,
        repo: repo.repo,
        default_branch: repo.default_branch,
        status: repo.status,
    }
}

/// `POST /federation/import-repo`
///
/// Registers (or finds) the repository, claims its ingest gate, and marks
/// it Ingesting. Returns 202: the snapshot itself arrives as a fact batch
/// from the extraction collaborator. A second import while the gate is
/// held is rejected Busy so callers retry deliberately.
pub async fn import_repo(
    State(state): State<AppState>,
    Json(req): Json<ImportRepoRequest>,
) -> Result<(StatusCode, Json<ImportRepoResponse>), ApiError> {
    let mut service = state.service.lock().await;

    // Resolve (or allocate) the repo id first so the gate can be keyed on
    // it, then claim before any status transition.
    let existing = service.find_repo(&req.owner, &req.repo)?;
    let repo_id = match &existing {
        Some(repo) => repo.repo_id,
        None => {
            service
                .import_repo(&req.owner, &req.repo, &req.default_branch)
                .map(|r| r.repo_id)?
        }
    };

    if !state.ingest_gate.claim(repo_id) {
        return Err(ApiError::Busy(format!(
            "repository {}/{} is already ingesting",
            req.owner, req.repo
        )));
    }

    let repository = if existing.is_some() {
        // Re-import of a known repository: cycle it back to Ingesting.
        match service.import_repo(&req.owner, &req.repo, &req.default_branch) {
            Ok(repo) => repo,
            Err(err) => {
                state.ingest_gate.release(repo_id);
                return Err(err);
            }
        }
    } else {
        service.get_repo(repo_id)?
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(ImportRepoResponse {
            repo_id: repository.repo_id,
            status: repository.status,
        }),
    ))
}

/// `POST /federation/repos/{repo_id}/facts`
///
/// Completes the ingestion opened by `import-repo`: validates and commits
/// the snapshot, releases the gate, and dispatches the linker in the
/// background so this call never blocks on resolution.
pub async fn submit_facts(
    State(state): State<AppState>,
    Path(repo_id): Path<i64>,
    Json(req): Json<SubmitFactsRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let repo_id = RepoId(repo_id);

    // Gate transitions happen under the service lock (as in import_repo),
    // so a stale facts submission can neither commit into nor release a
    // window it does not own.
    let result = {
        let mut service = state.service.lock().await;
        if !state.ingest_gate.is_held(repo_id) {
            return Err(ApiError::Busy(format!(
                "no import in flight for repository {repo_id}; call import-repo first"
            )));
        }
        let result = service.ingest_facts(repo_id, &req.facts);
        state.ingest_gate.release(repo_id);
        result
    };
    let report = result?;

    // Background reaction: resolve pending links now that this repository
    // is ingested. Idempotent, so overlapping dispatches are harmless.
    let linker_state = state.clone();
    tokio::spawn(async move {
        let mut service = linker_state.service.lock().await;
        if let Err(err) = service.run_linker(repo_id) {
            tracing::warn!(repo_id = repo_id.0, error = %err, "linker pass failed");
        }
    });

    Ok(Json(IngestResponse {
        repo_id: report.repo_id,
        status: report.status,
        outcome: report.outcome,
    }))
}

/// `GET /federation/repos`
pub async fn list_repos(
    State(state): State<AppState>,
) -> Result<Json<RepoListResponse>, ApiError> {
    let service = state.service.lock().await;
    let repos = service.list_repos()?.into_iter().map(repo_view).collect();
    Ok(Json(RepoListResponse { repos }))
}

/// `GET /federation/repos/{repo_id}`
pub async fn get_repo(
    State(state): State<AppState>,
    Path(repo_id): Path<i64>,
) -> Result<Json<RepoView>, ApiError> {
    let service = state.service.lock().await;
    let repo = service.get_repo(RepoId(repo_id))?;
    Ok(Json(repo_view(repo)))
}
