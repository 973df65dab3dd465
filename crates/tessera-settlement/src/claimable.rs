//! Claimable balance lifecycle: create, then at most one claim.

use tessera_core::{OutPoint, SettlementConfig};
use tessera_crypto::claimable_id;

use crate::error::SettlementError;
use crate::journal::UndoRecord;
use crate::predicate::PredicateEvaluator;
use crate::state::StagedView;
use crate::types::{ClaimableBalance, ClaimableClaimParams, ClaimableCreateParams};

/// Applies claimable balance operations under the configured limits.
#[derive(Debug, Clone)]
pub struct ClaimableManager {
    max_claimants: usize,
    max_predicate_depth: usize,
    max_proof_len: usize,
    evaluator: PredicateEvaluator,
}

impl ClaimableManager {
    pub fn new(config: &SettlementConfig) -> Self {
        Self {
            max_claimants: config.max_claimants,
            max_predicate_depth: config.max_predicate_depth,
            max_proof_len: config.max_proof_len,
            evaluator: PredicateEvaluator::new(config.block_interval_secs),
        }
    }

    pub fn evaluator(&self) -> &PredicateEvaluator {
        &self.evaluator
    }

    /// Create a claimable balance funded by `funding_outpoint`.
    pub fn create(
        &self,
        view: &mut StagedView<'_>,
        params: &ClaimableCreateParams,
        funding_outpoint: OutPoint,
    ) -> Result<ClaimableBalance, SettlementError> {
        if params.claimants.is_empty() {
            return Err(SettlementError::EmptyClaimants);
        }
        if params.claimants.len() > self.max_claimants {
            return Err(SettlementError::TooManyClaimants {
                count: params.claimants.len(),
                max: self.max_claimants,
            });
        }
        if let Some(depth) = params
            .claimants
            .iter()
            .map(|c| c.predicate.depth())
            .find(|d| *d > self.max_predicate_depth)
        {
            return Err(SettlementError::PredicateTooDeep {
                depth,
                max: self.max_predicate_depth,
            });
        }

        let id = claimable_id(&funding_outpoint);
        if view.claimable(&id).is_some() {
            return Err(SettlementError::DuplicateClaimable(id));
        }

        let balance = ClaimableBalance {
            id,
            amount: params.amount,
            claimants: params.claimants.clone(),
            created_at: view.height(),
            funding_outpoint,
        };
        view.put_claimable(balance.clone());
        view.record(UndoRecord::ClaimableCreated { id });

        tracing::info!(
            claimable_id = %id,
            amount = balance.amount,
            claimants = balance.claimants.len(),
            height = balance.created_at,
            "Claimable balance created"
        );
        Ok(balance)
    }

    /// Claim a balance at the view's height, returning the consumed entity.
    pub fn claim(
        &self,
        view: &mut StagedView<'_>,
        params: &ClaimableClaimParams,
    ) -> Result<ClaimableBalance, SettlementError> {
        if let Some(proof) = &params.proof {
            if proof.len() > self.max_proof_len {
                return Err(SettlementError::ProofTooLong {
                    len: proof.len(),
                    max: self.max_proof_len,
                });
            }
        }

        let id = params.claimable_id;
        let balance = view
            .claimable(&id)
            .ok_or(SettlementError::UnknownClaimable(id))?;

        let claimant = balance.claimant_for(&params.claimer).ok_or(
            SettlementError::NoMatchingClaimant {
                claimable: id,
                claimer: params.claimer,
            },
        )?;

        let height = view.height();
        if !self
            .evaluator
            .evaluate(&claimant.predicate, height, params.proof.as_deref())
        {
            return Err(SettlementError::PredicateNotSatisfied {
                claimable: id,
                height,
            });
        }

        view.remove_claimable(id);
        view.record(UndoRecord::ClaimableClaimed {
            removed: balance.clone(),
        });

        tracing::info!(
            claimable_id = %id,
            claimer = %params.claimer,
            amount = balance.amount,
            height,
            "Claimable balance claimed"
        );
        Ok(balance)
    }
}
