pub mod error;
pub mod fact;
pub mod file;
pub mod graph;
pub mod id;
pub mod link;
pub mod node;
pub mod patch;
pub mod repo;

// Re-export commonly used types
pub use error::CoreError;
pub use fact::{Fact, NodeRef};
pub use file::FileRecord;
pub use graph::{FederationGraph, GraphSummary, RepoGraphStats};
pub use id::{NodeId, PatchId, RepoId};
pub use link::{CrossLink, PendingLink, PendingLinkKey};
pub use node::{Span, SymbolNode};
pub use patch::{DecideOutcome, PatchProposal, PatchStatus};
pub use repo::{RepoStatus, Repository};
