//! Symbol nodes: declarations extracted from source files.

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, RepoId};

/// Source span of a declaration, in 1-based lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub end_line: u32,
}

/// A symbol/declaration inside a file.
///
/// Identity is the tuple `(repo_id, file_path, name, kind)`; `node_id` is
/// its blake3 digest, so re-ingestion upserts rather than duplicates. The
/// `kind` is an open string ("function", "class", ...) as emitted by the
/// external fact extractor. A node is tombstoned -- not deleted -- when its
/// file is re-ingested without the symbol, and revives under the same id
/// if the symbol is declared again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub node_id: NodeId,
    pub repo_id: RepoId,
    pub file_path: String,
    pub name: String,
    pub kind: String,
    pub span: Option<Span>,
    pub tombstoned: bool,
}

impl SymbolNode {
    /// True when the node is part of the live graph.
    pub fn is_live(&self) -> bool {
        !self.tombstoned
    }
}
