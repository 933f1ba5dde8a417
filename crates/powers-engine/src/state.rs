//! Action lifecycle state derivation.
//!
//! The engine never stores a state field anywhere. An action's state is
//! a pure projection of ledger facts (timestamps, vote counts) and the
//! current block height, re-derived on every call. This consolidates the
//! lifecycle into one canonical enum with no numeric encoding at all.

use powers_core::{Action, Law, VoteCounts};

use crate::tally;

/// Discrete lifecycle state of an action.
///
/// Laws with `quorum == 0` never enter the voting lifecycle; their
/// actions go `NonExistent → Requested → Fulfilled` directly once the
/// checks pass. "Proposed" and "Active" are one observational state
/// ([`ActionState::Active`]) while the vote is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ActionState {
    /// No action record exists for this id (or the law never votes and
    /// execution has not been requested).
    NonExistent,
    /// A proposal exists and its vote is still open.
    Active,
    /// Cancelled by an authorized veto before resolution. Terminal.
    Cancelled,
    /// The vote closed without meeting quorum or threshold. Terminal.
    Defeated,
    /// The vote closed with quorum and threshold met.
    Succeeded,
    /// Execution has been invoked.
    Requested,
    /// Execution fully completed. Terminal.
    Fulfilled,
}

impl ActionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Cancelled | ActionState::Defeated | ActionState::Fulfilled
        )
    }

    /// Whether the action's proposal has passed: the vote succeeded, or
    /// execution is already underway or complete.
    pub fn passed(&self) -> bool {
        matches!(
            self,
            ActionState::Succeeded | ActionState::Requested | ActionState::Fulfilled
        )
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ActionState::NonExistent => "non-existent",
            ActionState::Active => "active",
            ActionState::Cancelled => "cancelled",
            ActionState::Defeated => "defeated",
            ActionState::Succeeded => "succeeded",
            ActionState::Requested => "requested",
            ActionState::Fulfilled => "fulfilled",
        };
        write!(f, "{label}")
    }
}

/// Derive the current state of an action from ledger facts.
///
/// Ordering matters: terminal timestamps win over everything, a pending
/// request wins over the vote, and only then does the vote window and
/// tally decide.
pub fn derive_state(
    law: &Law,
    action: Option<&Action>,
    votes: VoteCounts,
    role_holder_count: u64,
    now: u64,
) -> ActionState {
    let Some(action) = action else {
        return ActionState::NonExistent;
    };

    if action.cancelled_at != 0 {
        return ActionState::Cancelled;
    }
    if action.fulfilled_at != 0 {
        return ActionState::Fulfilled;
    }
    if action.requested_at != 0 {
        return ActionState::Requested;
    }

    // Zero-quorum laws skip the voting states entirely; until execution
    // is requested there is nothing to observe.
    if !law.conditions.requires_vote() {
        return ActionState::NonExistent;
    }

    if action.proposed_at == 0 {
        return ActionState::NonExistent;
    }

    if now <= action.vote_end {
        return ActionState::Active;
    }

    if tally::evaluate(&law.conditions, role_holder_count, votes).passed() {
        ActionState::Succeeded
    } else {
        ActionState::Defeated
    }
}
