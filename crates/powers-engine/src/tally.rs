//! Vote tally and threshold arithmetic.
//!
//! Pure integer math over role-holder counts and cast votes. Thresholds
//! use truncating division so client and ledger can never disagree by a
//! rounding mode.

use powers_core::{LawConditions, VoteCounts};

/// Outcome of evaluating a tally against a law's quorum and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TallyOutcome {
    /// Participation (for + abstain) reached the quorum threshold.
    pub quorum_met: bool,
    /// Favorable votes reached the success threshold.
    pub threshold_met: bool,
}

impl TallyOutcome {
    /// Both quorum and threshold satisfied.
    pub fn passed(&self) -> bool {
        self.quorum_met && self.threshold_met
    }
}

/// Minimum participation required: `floor(holders * quorum / 100)`.
pub fn quorum_threshold(conditions: &LawConditions, role_holder_count: u64) -> u64 {
    role_holder_count.saturating_mul(u64::from(conditions.quorum)) / 100
}

/// Minimum favorable votes required: `floor(holders * succeed_at / 100)`.
pub fn success_threshold(conditions: &LawConditions, role_holder_count: u64) -> u64 {
    role_holder_count.saturating_mul(u64::from(conditions.succeed_at)) / 100
}

/// Evaluate a vote tally against a law's quorum and success thresholds.
///
/// With zero role holders both thresholds are zero and trivially met.
/// That is deliberate: an empty role must not permanently deadlock
/// governance.
pub fn evaluate(
    conditions: &LawConditions,
    role_holder_count: u64,
    votes: VoteCounts,
) -> TallyOutcome {
    TallyOutcome {
        quorum_met: votes.participation() >= quorum_threshold(conditions, role_holder_count),
        threshold_met: votes.for_votes >= success_threshold(conditions, role_holder_count),
    }
}
