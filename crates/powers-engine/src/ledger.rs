//! Collaborator interfaces: the ledger and the clock.
//!
//! The engine is a read-only projection over these. The ledger — not the
//! engine — is the single source of truth and serialization point for
//! vote casting and execution: at most one authoritative transition per
//! `(action, voter)` and per `(action, transition)`. [`MemoryLedger`]
//! is the reference implementation that enforces those rules, used as
//! the snapshot container in tests and tooling.

use std::collections::{BTreeMap, BTreeSet};

use powers_core::{
    Account, Action, ActionId, Law, LawGraph, LawId, RoleId, VoteCounts, VoteSupport,
};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Read access to governance facts: laws, role membership, actions, votes.
pub trait Ledger {
    /// Look up a law by index.
    fn law(&self, id: LawId) -> Option<&Law>;

    /// Number of accounts holding a role.
    fn role_holder_count(&self, role: RoleId) -> u64;

    /// All roles held by an account.
    fn caller_roles(&self, caller: &Account) -> BTreeSet<RoleId>;

    /// Every action ever recorded against a law, in id order.
    fn actions_for_law(&self, id: LawId) -> Vec<&Action>;

    /// Look up an action by id.
    fn action(&self, id: ActionId) -> Option<&Action>;

    /// Current vote tally for an action (all zero if none cast).
    fn votes(&self, id: ActionId) -> VoteCounts;
}

/// Source of the current block height.
pub trait Clock {
    /// The block height the evaluation snapshot was taken at.
    fn current_block(&self) -> u64;
}

/// A clock pinned to one block height. Evaluation is always against an
/// immutable snapshot, so a fixed value is the common case outside a
/// live RPC connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn current_block(&self) -> u64 {
        self.0
    }
}

/// In-memory ledger holding a law graph plus its action and vote history.
///
/// Append-only: actions are created and time-stamped, never deleted.
/// Vote uniqueness per `(voter, action)` and the voting window are
/// enforced here, as the engine assumes.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    graph: LawGraph,
    actions: BTreeMap<ActionId, Action>,
    votes: BTreeMap<ActionId, VoteCounts>,
    voters: BTreeSet<(ActionId, Account)>,
    role_members: BTreeMap<RoleId, BTreeSet<Account>>,
}

impl MemoryLedger {
    /// Create a ledger over a constructed law graph.
    pub fn new(graph: LawGraph) -> Self {
        Self {
            graph,
            ..Default::default()
        }
    }

    /// The law graph this ledger serves.
    pub fn graph(&self) -> &LawGraph {
        &self.graph
    }

    /// Grant a role to an account. Idempotent.
    pub fn grant_role(&mut self, role: RoleId, account: Account) {
        self.role_members.entry(role).or_default().insert(account);
    }

    /// Remove a role from an account. Idempotent.
    pub fn revoke_role(&mut self, role: RoleId, account: &Account) {
        if let Some(members) = self.role_members.get_mut(&role) {
            members.remove(account);
        }
    }

    /// Revoke a law: it stays in the graph with its history, but is no
    /// longer in force.
    pub fn revoke_law(&mut self, law_id: LawId) -> EngineResult<()> {
        let mut laws: Vec<Law> = self.graph.iter().cloned().collect();
        let law = laws
            .iter_mut()
            .find(|l| l.index == law_id)
            .ok_or(EngineError::LawNotFound { law_id })?;
        law.active = false;
        debug!(%law_id, "law revoked");
        self.graph = LawGraph::from_laws(laws);
        Ok(())
    }

    /// Record a new action against a law at block `now`.
    ///
    /// For laws that vote, this opens the voting window
    /// (`vote_start = now`, `vote_end = now + voting_period`).
    /// Re-submitting an existing `(law, calldata, nonce)` triple is
    /// idempotent and returns the already-derived id unchanged.
    pub fn propose(
        &mut self,
        law_id: LawId,
        caller: Account,
        calldata: Vec<u8>,
        nonce: u64,
        description: impl Into<String>,
        now: u64,
    ) -> EngineResult<ActionId> {
        let law = self
            .graph
            .get(law_id)
            .ok_or(EngineError::LawNotFound { law_id })?;
        if !law.active {
            return Err(EngineError::InactiveLaw { law_id });
        }

        let action_id = ActionId::derive(law_id, &calldata, nonce);
        if self.actions.contains_key(&action_id) {
            return Ok(action_id);
        }

        let mut action = Action::new(law_id, caller, calldata, nonce, description);
        action.proposed_at = now;
        if law.conditions.requires_vote() {
            action.vote_start = now;
            action.vote_end = now.saturating_add(law.conditions.voting_period);
        }

        debug!(%law_id, action_id = ?action.id, block = now, "action proposed");
        self.actions.insert(action_id, action);
        Ok(action_id)
    }

    /// Cast one vote. A voter gets exactly one ballot per action, and
    /// only while the vote is open.
    pub fn cast_vote(
        &mut self,
        voter: Account,
        action_id: ActionId,
        support: VoteSupport,
        now: u64,
    ) -> EngineResult<()> {
        let action = self
            .actions
            .get(&action_id)
            .ok_or(EngineError::ActionNotFound { action_id })?;

        if action.vote_end == 0 || now > action.vote_end || action.is_cancelled() {
            return Err(EngineError::VoteClosed { action_id });
        }
        if !self.voters.insert((action_id, voter.clone())) {
            return Err(EngineError::AlreadyVoted { voter, action_id });
        }

        self.votes.entry(action_id).or_default().record(support);
        debug!(?action_id, %voter, %support, block = now, "vote cast");
        Ok(())
    }

    /// Record that execution was invoked for an action.
    pub fn request(&mut self, action_id: ActionId, now: u64) -> EngineResult<()> {
        let action = self
            .actions
            .get_mut(&action_id)
            .ok_or(EngineError::ActionNotFound { action_id })?;
        if action.requested_at == 0 {
            action.requested_at = now;
        }
        Ok(())
    }

    /// Record that execution fully completed. The ledger decides when
    /// fulfilment fires; the engine only observes the timestamp.
    pub fn fulfil(&mut self, action_id: ActionId, now: u64) -> EngineResult<()> {
        let action = self
            .actions
            .get_mut(&action_id)
            .ok_or(EngineError::ActionNotFound { action_id })?;
        if action.requested_at == 0 {
            action.requested_at = now;
        }
        if action.fulfilled_at == 0 {
            action.fulfilled_at = now;
        }
        Ok(())
    }

    /// Cancel a pending action. Terminal; has no effect on an action
    /// that already fulfilled.
    pub fn cancel(&mut self, action_id: ActionId, now: u64) -> EngineResult<()> {
        let action = self
            .actions
            .get_mut(&action_id)
            .ok_or(EngineError::ActionNotFound { action_id })?;
        if action.fulfilled_at == 0 && action.cancelled_at == 0 {
            action.cancelled_at = now;
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn law(&self, id: LawId) -> Option<&Law> {
        self.graph.get(id)
    }

    fn role_holder_count(&self, role: RoleId) -> u64 {
        self.role_members
            .get(&role)
            .map_or(0, |members| members.len() as u64)
    }

    fn caller_roles(&self, caller: &Account) -> BTreeSet<RoleId> {
        self.role_members
            .iter()
            .filter(|(_, members)| members.contains(caller))
            .map(|(&role, _)| role)
            .collect()
    }

    fn actions_for_law(&self, id: LawId) -> Vec<&Action> {
        self.actions
            .values()
            .filter(|action| action.law_id == id)
            .collect()
    }

    fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(&id)
    }

    fn votes(&self, id: ActionId) -> VoteCounts {
        self.votes.get(&id).copied().unwrap_or_default()
    }
}
