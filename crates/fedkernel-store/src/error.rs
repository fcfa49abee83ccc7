//! Storage error types for fedkernel-store.
//!
//! [`StorageError`] covers all anticipated failure modes in the storage
//! layer: database and serialization errors, entity-not-found variants,
//! and fact-batch validation failures (which carry the offending record
//! so callers can report it verbatim).

use thiserror::Error;

use fedkernel_core::{NodeId, PatchId, RepoId};

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A repository with the given id was not found.
    #[error("repository not found: {0}")]
    RepoNotFound(RepoId),

    /// A repository with the given coordinates already exists.
    #[error("repository already registered: {owner}/{repo}")]
    RepoExists { owner: String, repo: String },

    /// A node was not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A proposal was not found.
    #[error("proposal not found: {0}")]
    ProposalNotFound(PatchId),

    /// A fact batch failed validation; ingestion of the batch aborts.
    ///
    /// `fact` is the offending record rendered as JSON so the error can be
    /// surfaced to the caller without re-deriving it.
    #[error("invalid fact at index {index}: {reason}")]
    InvalidFact {
        index: usize,
        reason: String,
        fact: serde_json::Value,
    },

    /// Stored data could not be mapped back to a domain type.
    #[error("corrupt record: {reason}")]
    CorruptRecord { reason: String },
}
