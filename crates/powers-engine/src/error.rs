//! Error types for the governance engine.

use powers_core::{Account, ActionId, LawId};
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while building a law graph or evaluating checks.
///
/// Only configuration faults and collaborator-rule violations surface
/// here. Authorization, timing, and dependency failures are expected
/// outcomes and are reported as [`Verdict`](crate::Verdict) facets, not
/// errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A law template named a law type with no known deployed address.
    /// Fatal to the whole build: a partially built constitution is
    /// unacceptable.
    #[error("unknown law type: {name:?}")]
    UnknownLawType { name: String },

    /// A law referenced by index was not found in the graph.
    #[error("law not found: {law_id}")]
    LawNotFound { law_id: LawId },

    /// A law's dependency field points at an index with no law behind it.
    #[error("law {law_id} depends on {dependency}, which does not exist in the graph")]
    DependencyNotFound { law_id: LawId, dependency: LawId },

    /// An action referenced by id was not found in the ledger.
    #[error("action not found: {action_id:?}")]
    ActionNotFound { action_id: ActionId },

    /// More law templates than the u16 index space can address.
    #[error("law graph has {len} templates; indices are capped at {max}", max = u16::MAX)]
    GraphTooLarge { len: usize },

    /// A template's law reference resolved outside the final law list.
    #[error("template at position {position} references law index {resolved}, outside 1..={graph_len}")]
    BadReference {
        position: usize,
        resolved: i64,
        graph_len: usize,
    },

    /// A percentage field is out of the 0..=100 range.
    #[error("law {law_id} has invalid {field}: {value} (must be 0..=100)")]
    InvalidPercentage {
        law_id: LawId,
        field: &'static str,
        value: u8,
    },

    /// A voter attempted a second vote on the same action.
    #[error("{voter} already voted on {action_id:?}")]
    AlreadyVoted { voter: Account, action_id: ActionId },

    /// A vote was cast outside the action's voting window.
    #[error("voting is closed for {action_id:?}")]
    VoteClosed { action_id: ActionId },

    /// The action targets a law that has been revoked.
    #[error("law {law_id} has been revoked")]
    InactiveLaw { law_id: LawId },

    /// Calldata values did not match the law's parameter specs.
    #[error("calldata mismatch for {name:?}: {message}")]
    CalldataMismatch { name: String, message: String },

    /// Codec serialization/deserialization error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
