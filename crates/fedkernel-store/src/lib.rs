//! Storage abstraction for the federation graph and patch proposals.
//!
//! Provides the [`FederationStore`] trait defining the storage contract
//! that all backends implement, plus [`InMemoryStore`] and [`SqliteStore`]
//! as first-class backends with identical semantics.
//!
//! # Architecture
//!
//! The storage layer has a two-layer API:
//! - **Low-level CRUD** methods (upserts and lookups for repositories,
//!   files, nodes, links, and proposals), each keyed by the identity
//!   tuples that make re-ingestion idempotent.
//! - **High-level atomic** methods (`apply_snapshot`, `update_proposals`)
//!   that commit a whole unit of work or none of it.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`hash`]: blake3 identity and content hashing
//! - [`plan`]: snapshot plan builder (validation + diff against the store)
//! - [`traits`]: FederationStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema constants and migration setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod hash;
pub mod memory;
pub mod plan;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use hash::{file_content_hash, node_id_for};
pub use memory::InMemoryStore;
pub use plan::{build_snapshot_plan, FilePlan, SnapshotOutcome, SnapshotPlan};
pub use sqlite::SqliteStore;
pub use traits::FederationStore;
