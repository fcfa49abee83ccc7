//! Incremental cross-repository link resolution.
//!
//! Runs as a background reaction after a snapshot commits. Two passes per
//! ingested repository: resolve other repositories' pending links that
//! target it, then resolve its own pending links whose target
//! repositories are already ingested (covering links declared after the
//! target's ingestion). Both passes are idempotent -- edge upserts make
//! duplicate or overlapping invocations harmless.

use std::collections::BTreeSet;

use serde::Serialize;

use fedkernel_core::{CrossLink, PendingLink, RepoId, RepoStatus, Repository};
use fedkernel_store::{FederationStore, StorageError};

use crate::error::ApiError;
use crate::service::FederationService;

/// Counters from one linker run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LinkerReport {
    /// Pending links turned into at least one resolved edge.
    pub resolved: usize,
    /// Resolved edges written (fan-out counts each edge).
    pub edges_written: usize,
    /// Pending links with no match this pass.
    pub unmatched: usize,
    /// Pending links skipped because their source node is tombstoned.
    pub skipped_dead_source: usize,
}

impl FederationService {
    /// Resolves pending links after `repo_id` was ingested.
    pub fn run_linker(&mut self, repo_id: RepoId) -> Result<LinkerReport, ApiError> {
        let repo = self.store().get_repo(repo_id)?;
        let mut report = LinkerReport::default();

        // Pass 1: links from anywhere targeting the freshly ingested
        // repository.
        let targeting = self.store().list_unresolved(&repo.owner, &repo.repo)?;
        self.resolve_batch(&repo, targeting, &mut report)?;

        // Pass 2: this repository's own pending links whose targets are
        // already ingested (their `onRepositoryIngested` moment has
        // passed).
        let outgoing = self.store().list_pending_from_repo(repo_id)?;
        let mut targets: BTreeSet<(String, String)> = BTreeSet::new();
        for pending in outgoing.iter().filter(|p| !p.resolved) {
            targets.insert((pending.target_owner.clone(), pending.target_repo.clone()));
        }
        for (owner, repo_name) in targets {
            let Some(target) = self.store().find_repo(&owner, &repo_name)? else {
                continue;
            };
            if target.status != RepoStatus::Ingested || target.repo_id == repo_id {
                continue;
            }
            let pending = self.store().list_unresolved(&owner, &repo_name)?;
            let from_this_repo: Vec<PendingLink> = {
                let store = self.store();
                let mut kept = Vec::new();
                for p in pending {
                    let owned_here = store
                        .get_node(p.from)?
                        .map(|n| n.repo_id == repo_id)
                        .unwrap_or(false);
                    if owned_here {
                        kept.push(p);
                    }
                }
                kept
            };
            self.resolve_batch(&target, from_this_repo, &mut report)?;
        }

        tracing::info!(
            repo_id = repo_id.0,
            resolved = report.resolved,
            edges_written = report.edges_written,
            unmatched = report.unmatched,
            "linker pass complete"
        );
        Ok(report)
    }

    /// Attempts to resolve each pending link against `target_repo`'s live
    /// nodes.
    ///
    /// Tie-break when several nodes share the symbol name: an exact hint
    /// path match wins if the fact recorded one; otherwise edges fan out
    /// to every match -- ambiguity is preserved, never silently dropped.
    /// No match bumps the attempt counter and leaves the link pending,
    /// which is a steady state rather than an error.
    fn resolve_batch(
        &mut self,
        target_repo: &Repository,
        pending: Vec<PendingLink>,
        report: &mut LinkerReport,
    ) -> Result<(), StorageError> {
        for link in pending.into_iter().filter(|p| !p.resolved) {
            let source_live = self
                .store()
                .get_node(link.from)?
                .map(|n| n.is_live())
                .unwrap_or(false);
            if !source_live {
                report.skipped_dead_source += 1;
                continue;
            }

            let candidates = self
                .store()
                .find_nodes_by_symbol(target_repo.repo_id, &link.target_symbol)?;
            let chosen: Vec<_> = match &link.hint_path {
                Some(hint) => {
                    let exact: Vec<_> = candidates
                        .iter()
                        .filter(|n| &n.file_path == hint)
                        .collect();
                    if exact.is_empty() {
                        candidates.iter().collect()
                    } else {
                        exact
                    }
                }
                None => candidates.iter().collect(),
            };

            if chosen.is_empty() {
                self.store_mut().bump_pending_attempts(&link.key())?;
                report.unmatched += 1;
                continue;
            }

            for node in &chosen {
                self.store_mut().upsert_link(&CrossLink {
                    from: link.from,
                    to: node.node_id,
                    kind: link.kind.clone(),
                    weight: link.weight,
                    notes: link.notes.clone(),
                    retired: false,
                })?;
                report.edges_written += 1;
            }
            self.store_mut().mark_pending_resolved(&link.key())?;
            report.resolved += 1;
        }
        Ok(())
    }
}
