//! Core domain types shared across the Powers governance workspace.
//!
//! A DAO's behavior under Powers is defined by a set of composable,
//! role-gated laws. This crate models the laws themselves, the directed
//! dependency graph they form, and the actions (concrete invocation
//! attempts) recorded against them. All evaluation logic lives in
//! `powers-engine`; everything here is plain data.

use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Index of a law within a DAO's law graph.
///
/// Indices are 1-based, assigned sequentially at constitution time, and
/// never reused — a revoked law keeps its index and its action history.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LawId(pub u16);

impl fmt::Display for LawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier for a role within the DAO.
///
/// Role membership gates which laws an account may invoke. Two values are
/// reserved: [`RoleId::ADMIN`] and the [`RoleId::PUBLIC`] sentinel, which
/// marks a law as invocable by anyone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleId(pub u64);

impl RoleId {
    /// The admin role, holder of last-resort powers.
    pub const ADMIN: RoleId = RoleId(0);

    /// Sentinel meaning "no role required": anyone may act.
    pub const PUBLIC: RoleId = RoleId(u64::MAX);

    /// Check whether this is the public sentinel.
    pub fn is_public(&self) -> bool {
        *self == Self::PUBLIC
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_public() {
            write!(f, "public")
        } else {
            write!(f, "role:{}", self.0)
        }
    }
}

/// Opaque caller identity (an address string).
///
/// The engine never interprets the contents; it only compares accounts
/// and passes them to the ledger for role lookups.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account(pub String);

impl Account {
    /// Create an account from anything string-like.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// The raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Account {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Laws and the law graph
// =============================================================================

/// Access policy, voting parameters, time windows, and structural
/// dependencies of a single law.
///
/// Percentages are whole numbers in `0..=100`; durations are block
/// counts. `quorum == 0` means the law requires no vote at all — an
/// authorized caller can execute directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawConditions {
    /// Role permitted to invoke or propose this law.
    pub allowed_role: RoleId,
    /// Percentage of role holders that must participate for a vote to count.
    pub quorum: u8,
    /// Percentage of role holders that must vote in favor to pass.
    pub succeed_at: u8,
    /// Blocks a vote remains open once started.
    pub voting_period: u64,
    /// Minimum blocks between authorization (or vote end) and execution.
    pub delay_execution: u64,
    /// Minimum blocks between successive executions of this law.
    pub throttle_execution: u64,
    /// Law whose fulfilment is required before this one may be invoked.
    pub need_completed: Option<LawId>,
    /// Law that must NOT have been fulfilled for this one to be invoked.
    pub need_not_completed: Option<LawId>,
    /// Law whose last returned state this one consumes (informational,
    /// never a gating condition).
    pub read_state_from: Option<LawId>,
}

impl Default for LawConditions {
    fn default() -> Self {
        Self {
            allowed_role: RoleId::PUBLIC,
            quorum: 0,
            succeed_at: 0,
            voting_period: 0,
            delay_execution: 0,
            throttle_execution: 0,
            need_completed: None,
            need_not_completed: None,
            read_state_from: None,
        }
    }
}

impl LawConditions {
    /// Whether invoking this law opens a vote at all.
    pub fn requires_vote(&self) -> bool {
        self.quorum > 0
    }
}

/// A single governance law: identity, access policy, and dependencies.
///
/// Immutable after construction. Revocation flips `active` off but the
/// index and the action history are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Law {
    /// Stable, 1-based position in the law graph.
    pub index: LawId,
    /// Human readable name.
    pub name: String,
    /// Longer description shown to voters.
    pub description: String,
    /// Name of the deployed law implementation this entry binds to.
    pub law_type: String,
    /// Address the law type resolved to at constitution time.
    pub target_address: String,
    /// Opaque configuration payload handed to the law implementation.
    #[serde(default)]
    pub config: Vec<u8>,
    /// Access, voting, timing, and dependency parameters.
    pub conditions: LawConditions,
    /// Whether the law is currently in force.
    pub active: bool,
}

/// Kinds of structural dependency edges between laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Target law must have a fulfilled action.
    NeedCompleted,
    /// Target law must NOT have a fulfilled action.
    NeedNotCompleted,
    /// Target law supplies state data; never gates execution.
    ReadStateFrom,
}

impl DependencyKind {
    /// Whether edges of this kind gate execution.
    pub fn is_gating(&self) -> bool {
        !matches!(self, DependencyKind::ReadStateFrom)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::NeedCompleted => write!(f, "need_completed"),
            DependencyKind::NeedNotCompleted => write!(f, "need_not_completed"),
            DependencyKind::ReadStateFrom => write!(f, "read_state_from"),
        }
    }
}

/// The full law graph of a DAO: an ordered list of laws whose condition
/// fields reference each other by stable index.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LawGraph {
    laws: Vec<Law>,
}

impl LawGraph {
    /// Create a graph from an already-indexed list of laws.
    ///
    /// Callers normally go through the builder in `powers-engine`, which
    /// guarantees sequential 1-based indices.
    pub fn from_laws(laws: Vec<Law>) -> Self {
        Self { laws }
    }

    /// Number of laws ever adopted (revoked laws included).
    pub fn len(&self) -> usize {
        self.laws.len()
    }

    /// Whether the graph holds no laws.
    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
    }

    /// Look up a law by its 1-based index.
    pub fn get(&self, id: LawId) -> Option<&Law> {
        if id.0 == 0 {
            return None;
        }
        self.laws.get(usize::from(id.0) - 1)
    }

    /// Iterate all laws in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Law> {
        self.laws.iter()
    }

    /// Iterate only the laws currently in force.
    pub fn active_laws(&self) -> impl Iterator<Item = &Law> {
        self.laws.iter().filter(|law| law.active)
    }

    /// The law a given law reads state from, if any.
    pub fn state_source(&self, id: LawId) -> Option<&Law> {
        let law = self.get(id)?;
        law.conditions.read_state_from.and_then(|src| self.get(src))
    }

    /// Convert to a petgraph `StableDiGraph` for analysis/visualization.
    /// Returns the graph and a mapping from LawId to NodeIndex.
    ///
    /// Edges point from a law to the law it depends on. Dangling
    /// references (an index with no law behind it) produce no edge here;
    /// the evaluator reports those as configuration faults.
    pub fn to_petgraph(&self) -> (StableDiGraph<Law, DependencyKind>, HashMap<LawId, NodeIndex>) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for law in &self.laws {
            let idx = graph.add_node(law.clone());
            id_to_index.insert(law.index, idx);
        }

        for law in &self.laws {
            let deps = [
                (law.conditions.need_completed, DependencyKind::NeedCompleted),
                (law.conditions.need_not_completed, DependencyKind::NeedNotCompleted),
                (law.conditions.read_state_from, DependencyKind::ReadStateFrom),
            ];
            for (target, kind) in deps {
                if let Some(target) = target {
                    if let (Some(&from), Some(&to)) =
                        (id_to_index.get(&law.index), id_to_index.get(&target))
                    {
                        graph.add_edge(from, to, kind);
                    }
                }
            }
        }

        (graph, id_to_index)
    }

    /// Find cycles among the gating dependency edges
    /// (`need_completed` / `need_not_completed`).
    ///
    /// Advisory tooling only: a cycle is a constitution-authoring bug
    /// that manifests at evaluation time as perpetual non-satisfaction,
    /// never as a crash. `read_state_from` edges are informational and
    /// excluded. Each cycle is returned as a list of law indices.
    pub fn dependency_cycles(&self) -> Vec<Vec<LawId>> {
        let mut graph: StableDiGraph<LawId, DependencyKind> = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for law in &self.laws {
            let idx = graph.add_node(law.index);
            id_to_index.insert(law.index, idx);
        }

        for law in &self.laws {
            let deps = [
                (law.conditions.need_completed, DependencyKind::NeedCompleted),
                (law.conditions.need_not_completed, DependencyKind::NeedNotCompleted),
            ];
            for (target, kind) in deps {
                if let Some(target) = target {
                    if let (Some(&from), Some(&to)) =
                        (id_to_index.get(&law.index), id_to_index.get(&target))
                    {
                        graph.add_edge(from, to, kind);
                    }
                }
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .is_some_and(|&n| graph.find_edge(n, n).is_some())
            })
            .map(|scc| scc.into_iter().map(|n| graph[n]).collect())
            .collect()
    }
}

// =============================================================================
// Actions
// =============================================================================

/// Deterministic identifier of an action.
///
/// Derived from `(law index, calldata, nonce)` — the same triple always
/// yields the same id, so callers can re-derive it without a lookup.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub [u8; 32]);

impl ActionId {
    /// Derive the id for a `(law, calldata, nonce)` triple.
    ///
    /// Domain-separated so the triple cannot be confused with any other
    /// hashed structure, and length-prefixed so `(calldata, nonce)`
    /// boundaries are unambiguous.
    pub fn derive(law_id: LawId, calldata: &[u8], nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"powers:action:v1");
        hasher.update(law_id.0.to_le_bytes());
        hasher.update((calldata.len() as u64).to_le_bytes());
        hasher.update(calldata);
        hasher.update(nonce.to_le_bytes());
        Self(hasher.finalize().into())
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for byte in self.0 {
            s.push_str(&format!("{byte:02x}"));
        }
        s
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form: enough to tell actions apart in logs.
        write!(f, "ActionId({}…)", &self.to_hex()[..12])
    }
}

/// One concrete, nonce-disambiguated attempt to invoke a law.
///
/// Created by a caller submitting calldata against a law; mutated only
/// by the ledger in response to votes and execution; never deleted.
/// All timestamps are block heights with `0` meaning "not yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Deterministic id, see [`ActionId::derive`].
    pub id: ActionId,
    /// Law this action invokes.
    pub law_id: LawId,
    /// Account that submitted the action.
    pub caller: Account,
    /// Disambiguates repeated submissions of the same calldata.
    pub nonce: u64,
    /// Encoded parameters; opaque to the engine.
    #[serde(default)]
    pub calldata: Vec<u8>,
    /// Human readable intent.
    pub description: String,
    /// Block at which the action was proposed.
    pub proposed_at: u64,
    /// Block at which the vote opened (equals `proposed_at` when voted).
    pub vote_start: u64,
    /// Block at which the vote closes.
    pub vote_end: u64,
    /// Block at which execution was invoked.
    pub requested_at: u64,
    /// Block at which execution fully completed.
    pub fulfilled_at: u64,
    /// Block at which the action was cancelled.
    pub cancelled_at: u64,
}

impl Action {
    /// Create a fresh action record with no lifecycle timestamps set.
    pub fn new(
        law_id: LawId,
        caller: Account,
        calldata: Vec<u8>,
        nonce: u64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: ActionId::derive(law_id, &calldata, nonce),
            law_id,
            caller,
            nonce,
            calldata,
            description: description.into(),
            proposed_at: 0,
            vote_start: 0,
            vote_end: 0,
            requested_at: 0,
            fulfilled_at: 0,
            cancelled_at: 0,
        }
    }

    /// Whether execution has fully completed.
    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled_at != 0
    }

    /// Whether the action was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at != 0
    }
}

// =============================================================================
// Votes
// =============================================================================

/// A voter's position on an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteSupport {
    /// Vote against the action.
    Against,
    /// Vote in favor.
    For,
    /// Participate without taking a side (counts toward quorum only).
    Abstain,
}

impl fmt::Display for VoteSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteSupport::Against => write!(f, "against"),
            VoteSupport::For => write!(f, "for"),
            VoteSupport::Abstain => write!(f, "abstain"),
        }
    }
}

/// Tallied votes for an action. Counts only ever increase; the ledger is
/// the serialization point that guarantees one vote per (voter, action).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    /// Votes in favor.
    pub for_votes: u64,
    /// Votes against.
    pub against_votes: u64,
    /// Abstentions.
    pub abstain_votes: u64,
}

impl VoteCounts {
    /// Create counts from raw tallies.
    pub fn new(for_votes: u64, against_votes: u64, abstain_votes: u64) -> Self {
        Self {
            for_votes,
            against_votes,
            abstain_votes,
        }
    }

    /// Participation that counts toward quorum: for + abstain.
    pub fn participation(&self) -> u64 {
        self.for_votes.saturating_add(self.abstain_votes)
    }

    /// Total ballots cast.
    pub fn total(&self) -> u64 {
        self.for_votes
            .saturating_add(self.against_votes)
            .saturating_add(self.abstain_votes)
    }

    /// Record one ballot.
    pub fn record(&mut self, support: VoteSupport) {
        match support {
            VoteSupport::Against => self.against_votes += 1,
            VoteSupport::For => self.for_votes += 1,
            VoteSupport::Abstain => self.abstain_votes += 1,
        }
    }
}

// =============================================================================
// Calldata parameter specs
// =============================================================================

/// Shape of a single calldata parameter, used by the codec seam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    /// An address string.
    Address,
    /// An unsigned integer.
    Uint,
    /// A boolean flag.
    Bool,
    /// A UTF-8 string.
    Str,
    /// Raw bytes (hex-encoded on the wire).
    Bytes,
    /// Homogeneous array of another kind.
    Array(Box<ParamKind>),
}

/// Named, typed description of one calldata parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, for display and error messages.
    pub name: String,
    /// Expected kind of the value.
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn action_id_is_deterministic() {
        let a = ActionId::derive(LawId(3), b"payload", 7);
        let b = ActionId::derive(LawId(3), b"payload", 7);
        assert_eq!(a, b);

        // Any component changing changes the id.
        assert_ne!(a, ActionId::derive(LawId(4), b"payload", 7));
        assert_ne!(a, ActionId::derive(LawId(3), b"payloae", 7));
        assert_ne!(a, ActionId::derive(LawId(3), b"payload", 8));
    }

    #[test]
    fn action_id_length_prefix_disambiguates() {
        // Without length prefixing these two would hash identically:
        // calldata "ab" + nonce bytes vs calldata "a" + shifted bytes.
        let a = ActionId::derive(LawId(1), b"ab", 0);
        let b = ActionId::derive(LawId(1), b"a", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn law_graph_lookup_is_one_based() {
        let graph = LawGraph::from_laws(vec![
            law(1, LawConditions::default()),
            law(2, LawConditions::default()),
        ]);

        assert_eq!(graph.get(LawId(1)).map(|l| l.index), Some(LawId(1)));
        assert_eq!(graph.get(LawId(2)).map(|l| l.index), Some(LawId(2)));
        assert!(graph.get(LawId(0)).is_none());
        assert!(graph.get(LawId(3)).is_none());
    }

    #[test]
    fn state_source_follows_read_state_from() {
        let graph = LawGraph::from_laws(vec![
            law(1, LawConditions::default()),
            law(
                2,
                LawConditions {
                    read_state_from: Some(LawId(1)),
                    ..Default::default()
                },
            ),
        ]);

        assert_eq!(graph.state_source(LawId(2)).map(|l| l.index), Some(LawId(1)));
        assert!(graph.state_source(LawId(1)).is_none());
    }

    #[test]
    fn dependency_cycles_ignores_read_state_from() {
        // 1 -> 2 -> 1 via need_completed is a cycle; a read_state_from
        // self-loop on 3 is not.
        let graph = LawGraph::from_laws(vec![
            law(
                1,
                LawConditions {
                    need_completed: Some(LawId(2)),
                    ..Default::default()
                },
            ),
            law(
                2,
                LawConditions {
                    need_completed: Some(LawId(1)),
                    ..Default::default()
                },
            ),
            law(
                3,
                LawConditions {
                    read_state_from: Some(LawId(3)),
                    ..Default::default()
                },
            ),
        ]);

        let cycles = graph.dependency_cycles();
        assert_eq!(cycles.len(), 1);
        let mut cycle = cycles[0].clone();
        cycle.sort();
        assert_eq!(cycle, vec![LawId(1), LawId(2)]);
    }

    #[test]
    fn dependency_cycles_detects_self_reference() {
        let graph = LawGraph::from_laws(vec![law(
            1,
            LawConditions {
                need_completed: Some(LawId(1)),
                ..Default::default()
            },
        )]);

        assert_eq!(graph.dependency_cycles(), vec![vec![LawId(1)]]);
    }

    #[test]
    fn vote_counts_participation_excludes_against() {
        let mut counts = VoteCounts::default();
        counts.record(VoteSupport::For);
        counts.record(VoteSupport::For);
        counts.record(VoteSupport::Against);
        counts.record(VoteSupport::Abstain);

        assert_eq!(counts.for_votes, 2);
        assert_eq!(counts.against_votes, 1);
        assert_eq!(counts.abstain_votes, 1);
        assert_eq!(counts.participation(), 3);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn to_petgraph_adds_dependency_edges() {
        let graph = LawGraph::from_laws(vec![
            law(1, LawConditions::default()),
            law(
                2,
                LawConditions {
                    need_completed: Some(LawId(1)),
                    read_state_from: Some(LawId(1)),
                    ..Default::default()
                },
            ),
        ]);

        let (pg, id_to_index) = graph.to_petgraph();
        assert_eq!(pg.node_count(), 2);
        assert_eq!(pg.edge_count(), 2);
        assert!(id_to_index.contains_key(&LawId(1)));
        assert!(id_to_index.contains_key(&LawId(2)));
    }
}
