//! File records: the unit of snapshot idempotence.

use serde::{Deserialize, Serialize};

use crate::id::RepoId;

/// A source file inside a repository, keyed `(repo_id, file_path)`.
///
/// `content_hash` is a blake3 hex digest of the file's canonically ordered
/// fact content. Re-ingesting a file whose hash is unchanged is a no-op on
/// the graph: its nodes and edges are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub repo_id: RepoId,
    pub file_path: String,
    pub content_hash: String,
}
