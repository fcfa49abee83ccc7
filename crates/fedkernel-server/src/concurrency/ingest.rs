//! Per-repository ingestion gate.

use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use fedkernel_core::RepoId;

/// Exclusive per-repository claim held for the duration of a snapshot.
///
/// Claimed by `import-repo`, released when the snapshot reaches Ingested
/// or Failed. Ingestion of different repositories proceeds concurrently;
/// a second claim on the same repository fails immediately.
#[derive(Debug, Default)]
pub struct IngestGate {
    active: DashMap<RepoId, Instant>,
}

impl IngestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to claim the gate for a repository. Returns false if an
    /// ingestion is already in flight.
    pub fn claim(&self, repo_id: RepoId) -> bool {
        match self.active.entry(repo_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Instant::now());
                true
            }
        }
    }

    /// Releases the gate; harmless if not held.
    pub fn release(&self, repo_id: RepoId) {
        self.active.remove(&repo_id);
    }

    /// True while an ingestion is in flight for the repository.
    pub fn is_held(&self, repo_id: RepoId) -> bool {
        self.active.contains_key(&repo_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_per_repo() {
        let gate = IngestGate::new();
        assert!(gate.claim(RepoId(1)));
        assert!(!gate.claim(RepoId(1)));
        // A different repository is unaffected.
        assert!(gate.claim(RepoId(2)));

        gate.release(RepoId(1));
        assert!(!gate.is_held(RepoId(1)));
        assert!(gate.claim(RepoId(1)));
    }
}
