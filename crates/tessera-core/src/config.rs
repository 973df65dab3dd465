use serde::{Deserialize, Serialize};

/// How strictly close and claim transactions must pay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutPolicy {
    /// Total output value must not exceed the channel capacity or claimable
    /// amount. Destinations are not checked.
    Aggregate,
    /// As `Aggregate`, and each entitled party must receive exactly its
    /// entitlement through a pay-to-key output.
    Exact,
}

impl Default for PayoutPolicy {
    fn default() -> Self {
        Self::Exact
    }
}

/// Consensus parameters of the settlement layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Fixed block interval used to derive timestamps from heights.
    #[serde(default = "default_block_interval_secs")]
    pub block_interval_secs: u64,
    /// Maximum number of claimants on one claimable balance.
    #[serde(default = "default_max_claimants")]
    pub max_claimants: usize,
    /// Maximum nesting depth of a claim predicate. A leaf has depth 1.
    #[serde(default = "default_max_predicate_depth")]
    pub max_predicate_depth: usize,
    /// Maximum length of a hash-preimage proof.
    #[serde(default = "default_max_proof_len")]
    pub max_proof_len: usize,
    /// Number of blocks an undo journal entry is retained below the tip.
    #[serde(default = "default_journal_retention")]
    pub journal_retention: u64,
    /// Payout validation for close and claim transactions.
    #[serde(default)]
    pub payout_policy: PayoutPolicy,
}

fn default_block_interval_secs() -> u64 {
    60
}
fn default_max_claimants() -> usize {
    10
}
fn default_max_predicate_depth() -> usize {
    4
}
fn default_max_proof_len() -> usize {
    256
}
fn default_journal_retention() -> u64 {
    288
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            block_interval_secs: default_block_interval_secs(),
            max_claimants: default_max_claimants(),
            max_predicate_depth: default_max_predicate_depth(),
            max_proof_len: default_max_proof_len(),
            journal_retention: default_journal_retention(),
            payout_policy: PayoutPolicy::default(),
        }
    }
}
