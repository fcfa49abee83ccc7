//! Application state shared across axum handlers.
//!
//! [`AppState`] wraps the service in `Arc<tokio::sync::Mutex<>>`. The
//! async-aware mutex (not `std::sync::Mutex`) lets handlers await the
//! lock without blocking the tokio runtime; an `RwLock` is not an option
//! because `FederationService` holds a `rusqlite::Connection`, which is
//! `!Sync`. Finer-grained coordination happens through the ingest gate
//! (per repository) and the node-set lock (per proposal target set), not
//! at the service level.

use std::sync::Arc;

use crate::concurrency::{IngestGate, NodeSetLock};
use crate::error::ApiError;
use crate::service::FederationService;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The shared service (async Mutex -- non-blocking await).
    pub service: Arc<tokio::sync::Mutex<FederationService>>,
    /// Per-repository ingestion claim.
    pub ingest_gate: Arc<IngestGate>,
    /// Node-set critical sections for the patch workflow.
    pub patch_locks: Arc<NodeSetLock>,
}

impl AppState {
    /// Creates state backed by the SQLite database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self, ApiError> {
        let service = FederationService::new(db_path)?;
        Ok(AppState {
            service: Arc::new(tokio::sync::Mutex::new(service)),
            ingest_gate: Arc::new(IngestGate::new()),
            patch_locks: Arc::new(NodeSetLock::new()),
        })
    }

    /// Creates state on a temporary database (for testing).
    pub fn in_memory() -> Result<Self, ApiError> {
        let service = FederationService::in_memory()?;
        Ok(AppState {
            service: Arc::new(tokio::sync::Mutex::new(service)),
            ingest_gate: Arc::new(IngestGate::new()),
            patch_locks: Arc::new(NodeSetLock::new()),
        })
    }
}
