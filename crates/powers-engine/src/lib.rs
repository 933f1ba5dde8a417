//! Governance rule engine for the Powers protocol.
//!
//! A DAO under Powers is a set of composable, role-gated laws forming a
//! directed dependency graph, plus the actions (concrete invocation
//! attempts) recorded against them. This crate implements the engine
//! that decides, at any block height, what a caller may legally do:
//!
//! - **Builder**: compiles an ordered list of law templates — with
//!   forward and backward index references — into a fully indexed
//!   [`powers_core::LawGraph`].
//! - **State machine**: derives an action's discrete lifecycle state
//!   from ledger facts; no state is ever stored.
//! - **Tally**: pure quorum/threshold arithmetic over role-holder
//!   counts and cast votes.
//! - **Checks**: the top-level decision function combining role
//!   authorization, vote outcome, time windows, and dependency
//!   satisfaction into a [`Verdict`].
//!
//! ## The evaluation model
//!
//! ```text
//! Verdict = checks(law graph, action history, votes, now)
//! ```
//!
//! Evaluation is side-effect free and snapshot-based: the ledger and
//! clock are immutable value providers, every call is a pure function
//! of its inputs, and concurrent evaluation is safe by construction.
//! The ledger remains the single serialization point for vote casting
//! and execution; a verdict computed against a stale snapshot must be
//! re-checked before acting on it.

mod builder;
mod checks;
mod codec;
pub mod constitution;
mod error;
mod ledger;
mod state;
pub mod tally;

pub use builder::{
    ConditionTemplate, LawGraphBuilder, LawRef, LawTemplate, LawTypeRegistry, RoleTrackDescriptor,
};
pub use checks::{ChecksEvaluator, Verdict};
pub use codec::{derive_action_id, Codec, JsonCodec};
pub use error::{EngineError, EngineResult};
pub use ledger::{Clock, FixedClock, Ledger, MemoryLedger};
pub use state::{derive_state, ActionState};
pub use tally::{evaluate as evaluate_tally, TallyOutcome};

// Constitution documents
pub use constitution::{
    compile, ConstitutionDoc, ConstitutionMeta, LawRefSpec, LawSpec, LawTypeDecl, RoleTrackSpec,
};
