//! Router assembly for the federation HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax. CORS is permissive (the
/// dashboard and API clients call from various origins). TraceLayer
/// provides request-level logging via tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health/ping", get(handlers::health::ping))
        // Repository import + ingestion
        .route(
            "/federation/import-repo",
            post(handlers::repos::import_repo),
        )
        .route("/federation/repos", get(handlers::repos::list_repos))
        .route(
            "/federation/repos/{repo_id}",
            get(handlers::repos::get_repo),
        )
        .route(
            "/federation/repos/{repo_id}/facts",
            post(handlers::repos::submit_facts),
        )
        // Graph queries
        .route(
            "/federation/graph/query",
            get(handlers::graph::query_graph),
        )
        .route("/federation/graph/scan", get(handlers::graph::scan_graph))
        .route(
            "/federation/graph/unresolved",
            get(handlers::graph::list_unresolved),
        )
        // Patch workflow
        .route(
            "/federation/patches",
            get(handlers::patches::list_patches).post(handlers::patches::create_patch),
        )
        .route(
            "/federation/patches/{patch_id}",
            get(handlers::patches::get_patch),
        )
        .route(
            "/federation/patches/{patch_id}/review",
            post(handlers::patches::review_patch),
        )
        .route(
            "/federation/patches/{patch_id}/decide",
            post(handlers::patches::decide_patch),
        )
        .route(
            "/federation/patches/{patch_id}/withdraw",
            post(handlers::patches::withdraw_patch),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
