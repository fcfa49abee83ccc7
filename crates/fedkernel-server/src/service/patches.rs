//! Patch proposal workflow: propose, review, decide, withdraw.
//!
//! Callers (the HTTP handlers) hold the node-set lock for a proposal's
//! targets around `propose` and `decide`, so the conflict cascade is
//! atomic with respect to concurrent operations on overlapping node sets
//! while disjoint proposals proceed in parallel.

use fedkernel_core::{
    DecideOutcome, NodeId, PatchId, PatchProposal, PatchStatus, RepoStatus,
};
use fedkernel_store::FederationStore;

use crate::error::ApiError;
use crate::service::FederationService;

impl FederationService {
    /// Creates a proposal targeting live nodes of one file.
    ///
    /// Preconditions: the target repository must be Ingested, and every
    /// target id must resolve to a live node of the stated file --
    /// otherwise nothing is created. A still-open (Proposed/UnderReview)
    /// proposal from the same actor with an overlapping target set on the
    /// same file is superseded by the new one.
    pub fn propose(
        &mut self,
        owner: &str,
        repo: &str,
        file_path: &str,
        target_node_ids: Vec<NodeId>,
        actor: &str,
        now: i64,
    ) -> Result<PatchProposal, ApiError> {
        let repository = self
            .store()
            .find_repo(owner, repo)?
            .ok_or_else(|| ApiError::NotFound(format!("repository {owner}/{repo}")))?;
        if repository.status != RepoStatus::Ingested {
            return Err(ApiError::RepoNotIngested(format!(
                "repository {owner}/{repo} is {:?}",
                repository.status
            )));
        }
        if target_node_ids.is_empty() {
            return Err(ApiError::BadRequest(
                "at least one target node id is required".to_string(),
            ));
        }

        let mut missing = Vec::new();
        for node_id in &target_node_ids {
            let live_in_file = self.store().get_node(*node_id)?.is_some_and(|n| {
                n.is_live() && n.repo_id == repository.repo_id && n.file_path == file_path
            });
            if !live_in_file {
                missing.push(node_id.to_hex());
            }
        }
        if !missing.is_empty() {
            return Err(ApiError::TargetNotFound(missing));
        }

        let superseded: Vec<PatchProposal> = self
            .store()
            .find_open_proposals_touching(&target_node_ids)?
            .into_iter()
            .filter(|p| {
                p.actor == actor
                    && p.file_path == file_path
                    && matches!(
                        p.status,
                        PatchStatus::Proposed | PatchStatus::UnderReview
                    )
            })
            .map(|mut p| {
                p.status = PatchStatus::Superseded;
                p.decided_at = Some(now);
                p
            })
            .collect();

        let proposal = PatchProposal {
            patch_id: PatchId::new(),
            repo_id: repository.repo_id,
            owner: owner.to_string(),
            repo: repo.to_string(),
            file_path: file_path.to_string(),
            target_node_ids,
            actor: actor.to_string(),
            status: PatchStatus::Proposed,
            conflicts_with: Vec::new(),
            created_at: now,
            reviewed_by: None,
            decided_at: None,
            decided_by: None,
        };
        self.store_mut().insert_proposal(&proposal)?;
        if !superseded.is_empty() {
            tracing::info!(
                patch_id = %proposal.patch_id,
                count = superseded.len(),
                "superseding older proposals from the same actor"
            );
            self.store_mut().update_proposals(&superseded)?;
        }
        Ok(proposal)
    }

    /// Claims a proposal for review: Proposed -> UnderReview.
    pub fn review(&mut self, patch_id: PatchId, actor: &str) -> Result<PatchProposal, ApiError> {
        let mut proposal = self.require_proposal(patch_id)?;
        if proposal.status != PatchStatus::Proposed {
            return Err(ApiError::Conflict(format!(
                "patch {patch_id} is {}; only Proposed patches can move to review",
                proposal.status.as_str()
            )));
        }
        proposal.status = PatchStatus::UnderReview;
        proposal.reviewed_by = Some(actor.to_string());
        self.store_mut()
            .update_proposals(std::slice::from_ref(&proposal))?;
        Ok(proposal)
    }

    /// Decides a proposal.
    ///
    /// Approval is allowed only from Proposed/UnderReview; a Conflicted
    /// proposal must be re-proposed against the then-current graph to be
    /// approvable. Approval atomically moves every other non-terminal
    /// proposal with an overlapping target set to Conflicted, appending
    /// this patch id to its `conflicts_with`. Rejection is allowed from
    /// any non-terminal status, Conflicted included.
    ///
    /// Returns the decided proposal and the cascade of newly conflicted
    /// ones.
    pub fn decide(
        &mut self,
        patch_id: PatchId,
        outcome: DecideOutcome,
        actor: Option<&str>,
        now: i64,
    ) -> Result<(PatchProposal, Vec<PatchProposal>), ApiError> {
        let mut proposal = self.require_proposal(patch_id)?;
        if proposal.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "patch {patch_id} is already {}",
                proposal.status.as_str()
            )));
        }

        match outcome {
            DecideOutcome::Rejected => {
                proposal.status = PatchStatus::Rejected;
                proposal.decided_at = Some(now);
                proposal.decided_by = actor.map(str::to_string);
                self.store_mut()
                    .update_proposals(std::slice::from_ref(&proposal))?;
                Ok((proposal, Vec::new()))
            }
            DecideOutcome::Approved => {
                if proposal.status == PatchStatus::Conflicted {
                    return Err(ApiError::Conflict(format!(
                        "patch {patch_id} is Conflicted and cannot be approved; \
                         re-propose it against the current graph"
                    )));
                }
                proposal.status = PatchStatus::Approved;
                proposal.decided_at = Some(now);
                proposal.decided_by = actor.map(str::to_string);

                let cascade: Vec<PatchProposal> = self
                    .store()
                    .find_open_proposals_touching(&proposal.target_node_ids)?
                    .into_iter()
                    .filter(|p| p.patch_id != patch_id)
                    .map(|mut p| {
                        p.status = PatchStatus::Conflicted;
                        if !p.conflicts_with.contains(&patch_id) {
                            p.conflicts_with.push(patch_id);
                        }
                        p
                    })
                    .collect();

                // One batch: the approval and its cascade commit together
                // or not at all.
                let mut batch = Vec::with_capacity(1 + cascade.len());
                batch.push(proposal.clone());
                batch.extend(cascade.iter().cloned());
                self.store_mut().update_proposals(&batch)?;

                tracing::info!(
                    patch_id = %patch_id,
                    conflicted = cascade.len(),
                    "proposal approved"
                );
                Ok((proposal, cascade))
            }
        }
    }

    /// Withdraws a non-terminal proposal: its own actor retracts it, which
    /// records a rejection decided by that actor.
    pub fn withdraw(&mut self, patch_id: PatchId, now: i64) -> Result<PatchProposal, ApiError> {
        let mut proposal = self.require_proposal(patch_id)?;
        if proposal.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "patch {patch_id} is already {}",
                proposal.status.as_str()
            )));
        }
        proposal.status = PatchStatus::Rejected;
        proposal.decided_at = Some(now);
        proposal.decided_by = Some(proposal.actor.clone());
        self.store_mut()
            .update_proposals(std::slice::from_ref(&proposal))?;
        Ok(proposal)
    }

    /// Target node ids of a proposal, for lock acquisition before the
    /// critical section.
    pub fn proposal_targets(&self, patch_id: PatchId) -> Result<Vec<NodeId>, ApiError> {
        Ok(self.require_proposal(patch_id)?.target_node_ids)
    }

    /// Retrieves a proposal or fails NotFound.
    pub fn require_proposal(&self, patch_id: PatchId) -> Result<PatchProposal, ApiError> {
        self.store()
            .get_proposal(patch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("patch {patch_id}")))
    }
}
