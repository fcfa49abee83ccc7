//! Concurrency primitives for ingestion and patch decisions.
//!
//! - [`IngestGate`]: per-repository exclusive claim; a second import of a
//!   repository already ingesting is rejected so callers retry
//!   deliberately, never queued silently.
//! - [`NodeSetLock`]: awaitable critical sections scoped to a set of node
//!   ids, so proposal decisions on disjoint node sets never serialize
//!   against each other.

pub mod ingest;
pub mod node_set;

pub use ingest::IngestGate;
pub use node_set::{NodeSetGuard, NodeSetLock};
