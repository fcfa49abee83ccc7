//! Core error types for fedkernel-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! identifier parsing and status string mapping.

use thiserror::Error;

/// Core errors produced by the fedkernel-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id string was not a 64-character hex digest.
    #[error("invalid node id: '{value}'")]
    InvalidNodeId { value: String },

    /// A patch id string was not a valid UUID.
    #[error("invalid patch id: '{value}'")]
    InvalidPatchId { value: String },

    /// A repository status string had no matching variant.
    #[error("unknown repository status: '{value}'")]
    UnknownRepoStatus { value: String },

    /// A patch status string had no matching variant.
    #[error("unknown patch status: '{value}'")]
    UnknownPatchStatus { value: String },

    /// A decide outcome string was neither "Approved" nor "Rejected".
    #[error("unknown decide outcome: '{value}'")]
    UnknownOutcome { value: String },
}
