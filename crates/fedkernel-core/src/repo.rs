//! Repository identity and ingestion status.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::RepoId;

/// Lifecycle status of an ingested repository.
///
/// Transitions are driven by the fact ingestor: Pending on registration,
/// Ingesting while a snapshot is in flight, then Ingested or Failed.
/// Re-ingestion cycles an Ingested (or Failed) repository back through
/// Ingesting; repositories are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepoStatus {
    Pending,
    Ingesting,
    Ingested,
    Failed,
}

impl RepoStatus {
    /// TEXT form for storage columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoStatus::Pending => "Pending",
            RepoStatus::Ingesting => "Ingesting",
            RepoStatus::Ingested => "Ingested",
            RepoStatus::Failed => "Failed",
        }
    }

    /// Parses the TEXT form back into a status.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "Pending" => Ok(RepoStatus::Pending),
            "Ingesting" => Ok(RepoStatus::Ingesting),
            "Ingested" => Ok(RepoStatus::Ingested),
            "Failed" => Ok(RepoStatus::Failed),
            other => Err(CoreError::UnknownRepoStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// A source repository known to the federation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Stable id assigned at first import.
    pub repo_id: RepoId,
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub status: RepoStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_roundtrip() {
        for status in [
            RepoStatus::Pending,
            RepoStatus::Ingesting,
            RepoStatus::Ingested,
            RepoStatus::Failed,
        ] {
            assert_eq!(RepoStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(RepoStatus::parse("Cloning").is_err());
    }
}
