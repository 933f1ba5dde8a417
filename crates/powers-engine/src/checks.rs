//! The condition/checks evaluator: the engine's sole outward entry point.
//!
//! Combines role authorization, vote outcome, time windows, and
//! dependency satisfaction into a [`Verdict`] the UI layer uses to
//! decide what a caller may currently do with an action. Strictly
//! read-only over the ledger and clock snapshot: recomputing the same
//! verdict any number of times is safe and yields identical results.

use powers_core::{Account, Action, ActionId, Law, LawId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::ledger::{Clock, Ledger};
use crate::state::{self, ActionState};

/// The evaluator's answer: independent boolean facets plus the overall
/// conjunction.
///
/// Facets are reported individually so callers can present a specific
/// reason ("throttle not passed", "dependency not fulfilled") rather
/// than a generic denial. A failed facet is an expected outcome, never
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Lifecycle state the action was observed in.
    pub state: ActionState,
    /// Whether the law opens a vote at all (`quorum > 0`). The proposal
    /// facets below are only meaningful when this is set.
    pub requires_vote: bool,
    /// Caller holds the law's allowed role (or the law is public).
    pub authorised: bool,
    /// An action record exists. Only meaningful when the law votes.
    pub proposal_exists: bool,
    /// The proposal succeeded, or execution is underway/complete.
    /// Only meaningful when the law votes.
    pub proposal_passed: bool,
    /// The execution delay has elapsed (or the law has none).
    pub delay_passed: bool,
    /// Enough blocks since the law's last fulfilment (or no throttle).
    pub throttle_passed: bool,
    /// The `need_completed` dependency is fulfilled (vacuously true when
    /// absent).
    pub law_completed: bool,
    /// The `need_not_completed` law has NOT been fulfilled (vacuously
    /// true when absent).
    pub law_not_completed: bool,
    /// This action has not itself already been fulfilled.
    pub action_not_completed: bool,
    /// Conjunction of every gate that applies to this law.
    pub all_passed: bool,
}

impl Verdict {
    /// Human-readable reasons for every failing facet, for display.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if !self.authorised {
            reasons.push("caller does not hold the required role".to_string());
        }
        if self.requires_vote && !self.proposal_exists {
            reasons.push("no proposal exists for this action".to_string());
        }
        if self.requires_vote && self.proposal_exists && !self.proposal_passed {
            reasons.push(format!("proposal has not passed (state: {})", self.state));
        }
        if !self.delay_passed {
            reasons.push("execution delay has not elapsed".to_string());
        }
        if !self.throttle_passed {
            reasons.push("throttle not passed".to_string());
        }
        if !self.law_completed {
            reasons.push("required dependency law has no fulfilled action".to_string());
        }
        if !self.law_not_completed {
            reasons.push("blocking law has already been fulfilled".to_string());
        }
        if !self.action_not_completed {
            reasons.push("this action has already been fulfilled".to_string());
        }
        reasons
    }
}

/// Read-only decision engine over a ledger and clock snapshot.
pub struct ChecksEvaluator<'a> {
    ledger: &'a dyn Ledger,
    clock: &'a dyn Clock,
}

impl<'a> ChecksEvaluator<'a> {
    /// Create an evaluator over the given snapshot.
    pub fn new(ledger: &'a dyn Ledger, clock: &'a dyn Clock) -> Self {
        Self { ledger, clock }
    }

    /// Evaluate what `caller` may currently do with `action_id` under
    /// law `law_id`.
    ///
    /// Configuration faults (unknown law, revoked law, dangling
    /// dependency index) abort with an error; everything a caller can
    /// fix by waiting or by holding a role comes back as a facet.
    pub fn evaluate(
        &self,
        law_id: LawId,
        action_id: ActionId,
        caller: &Account,
    ) -> EngineResult<Verdict> {
        let law = self
            .ledger
            .law(law_id)
            .ok_or(EngineError::LawNotFound { law_id })?;
        if !law.active {
            return Err(EngineError::InactiveLaw { law_id });
        }

        let now = self.clock.current_block();
        let action = self.ledger.action(action_id);
        let votes = self.ledger.votes(action_id);
        let role_holders = self.ledger.role_holder_count(law.conditions.allowed_role);
        let state = state::derive_state(law, action, votes, role_holders, now);

        let authorised = law.conditions.allowed_role.is_public()
            || self
                .ledger
                .caller_roles(caller)
                .contains(&law.conditions.allowed_role);

        let proposal_exists = !matches!(state, ActionState::NonExistent);
        let proposal_passed = state.passed();
        let delay_passed = self.delay_passed(law, action, now);
        let throttle_passed = self.throttle_passed(law, now);
        let law_completed = match law.conditions.need_completed {
            None => true,
            Some(dep) => self.dependency_fulfilled(law_id, dep)?,
        };
        let law_not_completed = match law.conditions.need_not_completed {
            None => true,
            Some(dep) => !self.dependency_fulfilled(law_id, dep)?,
        };
        let action_not_completed = !matches!(state, ActionState::Fulfilled);

        let all_passed = authorised
            && (!law.conditions.requires_vote() || proposal_passed)
            && delay_passed
            && throttle_passed
            && law_completed
            && law_not_completed
            && action_not_completed;

        let verdict = Verdict {
            state,
            requires_vote: law.conditions.requires_vote(),
            authorised,
            proposal_exists,
            proposal_passed,
            delay_passed,
            throttle_passed,
            law_completed,
            law_not_completed,
            action_not_completed,
            all_passed,
        };

        debug!(
            %law_id,
            ?action_id,
            block = now,
            state = %verdict.state,
            all_passed = verdict.all_passed,
            "checks evaluated"
        );
        Ok(verdict)
    }

    /// Execution delay gate. The reference point is the vote deadline
    /// for laws that vote, and the proposal block otherwise. With no
    /// action record there is no timestamp to anchor on, so the gate
    /// does not block (other facets already fail in that case).
    fn delay_passed(&self, law: &Law, action: Option<&Action>, now: u64) -> bool {
        let delay = law.conditions.delay_execution;
        if delay == 0 {
            return true;
        }
        let reference = match action {
            Some(action) if law.conditions.requires_vote() && action.vote_end != 0 => {
                action.vote_end
            }
            Some(action) if action.proposed_at != 0 => action.proposed_at,
            _ => return true,
        };
        now >= reference.saturating_add(delay)
    }

    /// Throttle gate: minimum spacing between successive executions of
    /// the same law, measured against the most recent fulfilment across
    /// all of its actions. A law that never executed has nothing to
    /// space against.
    fn throttle_passed(&self, law: &Law, now: u64) -> bool {
        let throttle = law.conditions.throttle_execution;
        if throttle == 0 {
            return true;
        }
        let last_fulfilment = self
            .ledger
            .actions_for_law(law.index)
            .iter()
            .map(|action| action.fulfilled_at)
            .max()
            .unwrap_or(0);
        if last_fulfilment == 0 {
            return true;
        }
        now >= last_fulfilment.saturating_add(throttle)
    }

    /// Whether the referenced law has at least one fulfilled action.
    /// A dangling index is a configuration fault, never silently
    /// treated as satisfied.
    fn dependency_fulfilled(&self, law_id: LawId, dependency: LawId) -> EngineResult<bool> {
        if self.ledger.law(dependency).is_none() {
            return Err(EngineError::DependencyNotFound { law_id, dependency });
        }
        Ok(self
            .ledger
            .actions_for_law(dependency)
            .iter()
            .any(|action| action.is_fulfilled()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FixedClock, MemoryLedger};
    use powers_core::{LawConditions, LawGraph, RoleId, VoteSupport};

    fn law(index: u16, conditions: LawConditions) -> Law {
        Law {
            index: LawId(index),
            name: format!("law {index}"),
            description: String::new(),
            law_type: "open_action".to_string(),
            target_address: "0x0".to_string(),
            config: Vec::new(),
            conditions,
            active: true,
        }
    }

    fn voted_conditions(role: RoleId) -> LawConditions {
        LawConditions {
            allowed_role: role,
            quorum: 50,
            succeed_at: 51,
            voting_period: 100,
            ..Default::default()
        }
    }

    #[test]
    fn public_law_authorises_anyone() {
        let graph = LawGraph::from_laws(vec![law(1, LawConditions::default())]);
        let mut ledger = MemoryLedger::new(graph);
        let id = ledger
            .propose(LawId(1), "0xanyone".into(), b"x".to_vec(), 1, "open", 100)
            .unwrap();

        let clock = FixedClock(100);
        let verdict = ChecksEvaluator::new(&ledger, &clock)
            .evaluate(LawId(1), id, &"0xanyone".into())
            .unwrap();

        assert!(verdict.authorised);
        assert!(!verdict.requires_vote);
        assert!(verdict.all_passed);
        assert!(verdict.reasons().is_empty());
    }

    #[test]
    fn role_gate_reports_unauthorised_as_facet() {
        let graph = LawGraph::from_laws(vec![law(
            1,
            LawConditions {
                allowed_role: RoleId(7),
                ..Default::default()
            },
        )]);
        let mut ledger = MemoryLedger::new(graph);
        ledger.grant_role(RoleId(7), "0xmember".into());
        let id = ledger
            .propose(LawId(1), "0xmember".into(), b"x".to_vec(), 1, "gated", 100)
            .unwrap();

        let clock = FixedClock(100);
        let evaluator = ChecksEvaluator::new(&ledger, &clock);

        let member = evaluator.evaluate(LawId(1), id, &"0xmember".into()).unwrap();
        assert!(member.authorised && member.all_passed);

        let outsider = evaluator
            .evaluate(LawId(1), id, &"0xoutsider".into())
            .unwrap();
        assert!(!outsider.authorised);
        assert!(!outsider.all_passed);
        assert_eq!(
            outsider.reasons(),
            vec!["caller does not hold the required role".to_string()]
        );
    }

    #[test]
    fn voted_law_requires_passed_proposal() {
        let graph = LawGraph::from_laws(vec![law(1, voted_conditions(RoleId(1)))]);
        let mut ledger = MemoryLedger::new(graph);
        for holder in ["0xa", "0xb", "0xc", "0xd"] {
            ledger.grant_role(RoleId(1), holder.into());
        }
        let id = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "vote me", 100)
            .unwrap();

        // Vote still open: not passed yet.
        let open = FixedClock(150);
        let verdict = ChecksEvaluator::new(&ledger, &open)
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap();
        assert_eq!(verdict.state, ActionState::Active);
        assert!(!verdict.all_passed);

        // 3 of 4 holders vote in favor: quorum 2, success 2.
        for voter in ["0xa", "0xb", "0xc"] {
            ledger
                .cast_vote(voter.into(), id, VoteSupport::For, 150)
                .unwrap();
        }

        let closed = FixedClock(201);
        let verdict = ChecksEvaluator::new(&ledger, &closed)
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap();
        assert_eq!(verdict.state, ActionState::Succeeded);
        assert!(verdict.proposal_passed);
        assert!(verdict.all_passed);
    }

    #[test]
    fn delay_measured_from_vote_end() {
        let mut conditions = voted_conditions(RoleId(1));
        conditions.delay_execution = 50;
        let graph = LawGraph::from_laws(vec![law(1, conditions)]);
        let mut ledger = MemoryLedger::new(graph);
        ledger.grant_role(RoleId(1), "0xa".into());
        let id = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "delayed", 100)
            .unwrap();
        ledger
            .cast_vote("0xa".into(), id, VoteSupport::For, 150)
            .unwrap();

        // Vote ends at 200; delay allows execution from 250.
        let too_soon = ChecksEvaluator::new(&ledger, &FixedClock(249))
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap();
        assert!(!too_soon.delay_passed);
        assert!(too_soon
            .reasons()
            .contains(&"execution delay has not elapsed".to_string()));

        let ready = ChecksEvaluator::new(&ledger, &FixedClock(250))
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap();
        assert!(ready.delay_passed);
    }

    #[test]
    fn delay_anchors_on_proposal_block_without_a_vote() {
        let graph = LawGraph::from_laws(vec![law(
            1,
            LawConditions {
                delay_execution: 50,
                ..Default::default()
            },
        )]);
        let mut ledger = MemoryLedger::new(graph);
        let id = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "unvoted", 100)
            .unwrap();

        // No vote window: the delay counts from the proposal block, so
        // execution opens at 150.
        let too_soon = ChecksEvaluator::new(&ledger, &FixedClock(149))
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap();
        assert!(!too_soon.delay_passed);
        assert!(!too_soon.all_passed);

        let ready = ChecksEvaluator::new(&ledger, &FixedClock(150))
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap();
        assert!(ready.delay_passed);
        assert!(ready.all_passed);

        // No action record at all: nothing to anchor on, the gate does
        // not block.
        let unrecorded = ActionId::derive(LawId(1), b"never proposed", 9);
        let verdict = ChecksEvaluator::new(&ledger, &FixedClock(100))
            .evaluate(LawId(1), unrecorded, &"0xa".into())
            .unwrap();
        assert_eq!(verdict.state, ActionState::NonExistent);
        assert!(verdict.delay_passed);
    }

    #[test]
    fn extreme_durations_block_without_overflowing() {
        let graph = LawGraph::from_laws(vec![
            law(
                1,
                LawConditions {
                    delay_execution: u64::MAX,
                    ..Default::default()
                },
            ),
            law(
                2,
                LawConditions {
                    throttle_execution: u64::MAX,
                    ..Default::default()
                },
            ),
        ]);
        let mut ledger = MemoryLedger::new(graph);
        let delayed = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "wait", 100)
            .unwrap();
        let first = ledger
            .propose(LawId(2), "0xa".into(), b"y".to_vec(), 1, "one", 100)
            .unwrap();
        ledger.fulfil(first, 110).unwrap();
        let second = ledger
            .propose(LawId(2), "0xa".into(), b"z".to_vec(), 2, "two", 120)
            .unwrap();

        let evaluator = ChecksEvaluator::new(&ledger, &FixedClock(u64::MAX));
        let verdict = evaluator.evaluate(LawId(1), delayed, &"0xa".into()).unwrap();
        assert!(!verdict.delay_passed);

        let verdict = evaluator.evaluate(LawId(2), second, &"0xa".into()).unwrap();
        assert!(!verdict.throttle_passed);
    }

    #[test]
    fn throttle_spaces_successive_executions() {
        let graph = LawGraph::from_laws(vec![law(
            1,
            LawConditions {
                throttle_execution: 100,
                ..Default::default()
            },
        )]);
        let mut ledger = MemoryLedger::new(graph);
        let first = ledger
            .propose(LawId(1), "0xa".into(), b"first".to_vec(), 1, "one", 400)
            .unwrap();
        ledger.fulfil(first, 500).unwrap();
        let second = ledger
            .propose(LawId(1), "0xa".into(), b"second".to_vec(), 2, "two", 540)
            .unwrap();

        let at_550 = ChecksEvaluator::new(&ledger, &FixedClock(550))
            .evaluate(LawId(1), second, &"0xa".into())
            .unwrap();
        assert!(!at_550.throttle_passed);
        assert!(!at_550.all_passed);
        assert!(at_550.reasons().contains(&"throttle not passed".to_string()));

        let at_600 = ChecksEvaluator::new(&ledger, &FixedClock(600))
            .evaluate(LawId(1), second, &"0xa".into())
            .unwrap();
        assert!(at_600.throttle_passed);
        assert!(at_600.all_passed);
    }

    #[test]
    fn need_completed_gates_until_dependency_fulfils() {
        let graph = LawGraph::from_laws(vec![
            law(1, LawConditions::default()),
            law(
                2,
                LawConditions {
                    need_completed: Some(LawId(1)),
                    ..Default::default()
                },
            ),
        ]);
        let mut ledger = MemoryLedger::new(graph);
        let gated = ledger
            .propose(LawId(2), "0xa".into(), b"x".to_vec(), 1, "gated", 100)
            .unwrap();

        let verdict = ChecksEvaluator::new(&ledger, &FixedClock(100))
            .evaluate(LawId(2), gated, &"0xa".into())
            .unwrap();
        assert!(!verdict.law_completed);
        assert!(!verdict.all_passed);

        // Fulfil an action of law 1; the gate opens.
        let dep = ledger
            .propose(LawId(1), "0xa".into(), b"y".to_vec(), 1, "dep", 100)
            .unwrap();
        ledger.fulfil(dep, 110).unwrap();

        let verdict = ChecksEvaluator::new(&ledger, &FixedClock(120))
            .evaluate(LawId(2), gated, &"0xa".into())
            .unwrap();
        assert!(verdict.law_completed);
        assert!(verdict.all_passed);
    }

    #[test]
    fn need_not_completed_blocks_after_fulfilment() {
        let graph = LawGraph::from_laws(vec![
            law(1, LawConditions::default()),
            law(
                2,
                LawConditions {
                    need_not_completed: Some(LawId(1)),
                    ..Default::default()
                },
            ),
        ]);
        let mut ledger = MemoryLedger::new(graph);
        let blocked = ledger
            .propose(LawId(2), "0xa".into(), b"x".to_vec(), 1, "exclusive", 100)
            .unwrap();

        let verdict = ChecksEvaluator::new(&ledger, &FixedClock(100))
            .evaluate(LawId(2), blocked, &"0xa".into())
            .unwrap();
        assert!(verdict.law_not_completed);
        assert!(verdict.all_passed);

        let other = ledger
            .propose(LawId(1), "0xa".into(), b"y".to_vec(), 1, "other path", 100)
            .unwrap();
        ledger.fulfil(other, 110).unwrap();

        let verdict = ChecksEvaluator::new(&ledger, &FixedClock(120))
            .evaluate(LawId(2), blocked, &"0xa".into())
            .unwrap();
        assert!(!verdict.law_not_completed);
        assert!(!verdict.all_passed);
    }

    #[test]
    fn dangling_dependency_is_a_configuration_fault() {
        let graph = LawGraph::from_laws(vec![law(
            1,
            LawConditions {
                need_completed: Some(LawId(9)),
                ..Default::default()
            },
        )]);
        let mut ledger = MemoryLedger::new(graph);
        let id = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "broken", 100)
            .unwrap();

        let err = ChecksEvaluator::new(&ledger, &FixedClock(100))
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DependencyNotFound {
                law_id: LawId(1),
                dependency: LawId(9),
            }
        ));
    }

    #[test]
    fn fulfilled_action_cannot_replay() {
        let graph = LawGraph::from_laws(vec![law(1, LawConditions::default())]);
        let mut ledger = MemoryLedger::new(graph);
        let id = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "once", 100)
            .unwrap();
        ledger.fulfil(id, 110).unwrap();

        let verdict = ChecksEvaluator::new(&ledger, &FixedClock(120))
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap();
        assert_eq!(verdict.state, ActionState::Fulfilled);
        assert!(!verdict.action_not_completed);
        assert!(!verdict.all_passed);
        assert!(verdict
            .reasons()
            .contains(&"this action has already been fulfilled".to_string()));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let graph = LawGraph::from_laws(vec![law(1, voted_conditions(RoleId(1)))]);
        let mut ledger = MemoryLedger::new(graph);
        ledger.grant_role(RoleId(1), "0xa".into());
        let id = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "stable", 100)
            .unwrap();

        let clock = FixedClock(150);
        let evaluator = ChecksEvaluator::new(&ledger, &clock);
        let first = evaluator.evaluate(LawId(1), id, &"0xa".into()).unwrap();
        for _ in 0..5 {
            let again = evaluator.evaluate(LawId(1), id, &"0xa".into()).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn revoked_law_is_an_error_not_a_denial() {
        let graph = LawGraph::from_laws(vec![law(1, LawConditions::default())]);
        let mut ledger = MemoryLedger::new(graph);
        let id = ledger
            .propose(LawId(1), "0xa".into(), b"x".to_vec(), 1, "soon gone", 100)
            .unwrap();
        ledger.revoke_law(LawId(1)).unwrap();

        let err = ChecksEvaluator::new(&ledger, &FixedClock(120))
            .evaluate(LawId(1), id, &"0xa".into())
            .unwrap_err();
        assert!(matches!(err, EngineError::InactiveLaw { law_id: LawId(1) }));
    }
}
