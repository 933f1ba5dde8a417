//! Declarative constitution documents.
//!
//! A constitution is the serialized form of a DAO's full law list:
//! metadata, the law-type deployments it binds to, plain laws, and
//! data-driven role tracks. `compile` turns a document into a law graph
//! through the builder, inheriting its fail-fast behavior.

use powers_core::{LawGraph, LawId, RoleId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builder::{
    ConditionTemplate, LawGraphBuilder, LawRef, LawTemplate, LawTypeRegistry, RoleTrackDescriptor,
};
use crate::error::EngineResult;

/// Root of a constitution document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstitutionDoc {
    /// Metadata about the constitution.
    pub meta: ConstitutionMeta,
    /// Law-type deployments this constitution binds to.
    #[serde(default)]
    pub law_types: Vec<LawTypeDecl>,
    /// Plain laws, in adoption order.
    #[serde(default)]
    pub laws: Vec<LawSpec>,
    /// Role tracks appended after the plain laws.
    #[serde(default)]
    pub role_tracks: Vec<RoleTrackSpec>,
}

/// Metadata about a constitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstitutionMeta {
    /// Name of the DAO.
    pub name: String,
    /// Revision identifier of the document schema.
    #[serde(default = "default_version")]
    pub version: String,
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Binds a law-type name to its deployed address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawTypeDecl {
    /// Name referenced by law specs.
    pub name: String,
    /// Deployed address.
    pub address: String,
}

/// Symbolic law reference in document form.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LawRefSpec {
    /// No dependency.
    #[default]
    None,
    /// A 1-based index.
    Absolute(u16),
    /// Offset from the law's own final index.
    Relative(i64),
}

impl From<LawRefSpec> for LawRef {
    fn from(spec: LawRefSpec) -> Self {
        match spec {
            LawRefSpec::None => LawRef::None,
            LawRefSpec::Absolute(index) => LawRef::Absolute(LawId(index)),
            LawRefSpec::Relative(offset) => LawRef::Relative(offset),
        }
    }
}

/// One law in document form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LawSpec {
    /// Human readable name.
    pub name: String,
    /// Longer description shown to voters.
    #[serde(default)]
    pub description: String,
    /// Law-type name, must appear in `law_types`.
    pub law_type: String,
    /// Opaque configuration payload for the law implementation.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Role id; `u64::MAX` (or omission) means public.
    #[serde(default = "default_public_role")]
    pub allowed_role: u64,
    /// Participation percentage; 0 means no vote.
    #[serde(default)]
    pub quorum: u8,
    /// Favorable-vote percentage required to pass.
    #[serde(default)]
    pub succeed_at: u8,
    /// Blocks a vote stays open.
    #[serde(default)]
    pub voting_period: u64,
    /// Blocks between vote end (or authorization) and execution.
    #[serde(default)]
    pub delay_execution: u64,
    /// Blocks between successive executions.
    #[serde(default)]
    pub throttle_execution: u64,
    /// Fulfilment dependency.
    #[serde(default)]
    pub need_completed: LawRefSpec,
    /// Exclusion dependency.
    #[serde(default)]
    pub need_not_completed: LawRefSpec,
    /// Informational state source.
    #[serde(default)]
    pub read_state_from: LawRefSpec,
}

fn default_public_role() -> u64 {
    RoleId::PUBLIC.0
}

impl LawSpec {
    fn into_template(self) -> EngineResult<LawTemplate> {
        let config = if self.config.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&self.config)?
        };
        Ok(LawTemplate {
            name: self.name,
            description: self.description,
            law_type: self.law_type,
            config,
            conditions: ConditionTemplate {
                allowed_role: RoleId(self.allowed_role),
                quorum: self.quorum,
                succeed_at: self.succeed_at,
                voting_period: self.voting_period,
                delay_execution: self.delay_execution,
                throttle_execution: self.throttle_execution,
                need_completed: self.need_completed.into(),
                need_not_completed: self.need_not_completed.into(),
                read_state_from: self.read_state_from.into(),
            },
        })
    }
}

/// One role track in document form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTrackSpec {
    /// Role whose members propose and vote.
    pub role: u64,
    /// Role that allocates and ends grants.
    pub allocator_role: u64,
    /// Track label.
    pub label: String,
    /// Quorum for the propose vote.
    pub quorum: u8,
    /// Success threshold for the propose vote.
    pub succeed_at: u8,
    /// Voting period for the propose vote.
    pub voting_period: u64,
    /// Law type for the propose law.
    #[serde(default = "default_propose_type")]
    pub propose_law_type: String,
    /// Law type for the allocate law.
    #[serde(default = "default_allocate_type")]
    pub allocate_law_type: String,
    /// Law type for the end law.
    #[serde(default = "default_end_type")]
    pub end_law_type: String,
}

fn default_propose_type() -> String {
    "grant_propose".to_string()
}

fn default_allocate_type() -> String {
    "grant_allocate".to_string()
}

fn default_end_type() -> String {
    "grant_end".to_string()
}

impl From<&RoleTrackSpec> for RoleTrackDescriptor {
    fn from(spec: &RoleTrackSpec) -> Self {
        Self {
            role: RoleId(spec.role),
            allocator_role: RoleId(spec.allocator_role),
            label: spec.label.clone(),
            quorum: spec.quorum,
            succeed_at: spec.succeed_at,
            voting_period: spec.voting_period,
            propose_law_type: spec.propose_law_type.clone(),
            allocate_law_type: spec.allocate_law_type.clone(),
            end_law_type: spec.end_law_type.clone(),
        }
    }
}

/// Compile a constitution document into a law graph.
///
/// Fails fast on any unknown law type, out-of-range reference, or
/// invalid percentage — a partially built constitution never escapes.
pub fn compile(doc: ConstitutionDoc) -> EngineResult<LawGraph> {
    let mut registry = LawTypeRegistry::new();
    for decl in &doc.law_types {
        registry.register(decl.name.clone(), decl.address.clone());
    }

    let mut builder = LawGraphBuilder::new(registry);
    for spec in doc.laws {
        builder.append(spec.into_template()?);
    }
    for track in &doc.role_tracks {
        builder.append_role_track(&RoleTrackDescriptor::from(track));
    }

    let graph = builder.build()?;
    info!(
        name = %doc.meta.name,
        version = %doc.meta.version,
        laws = graph.len(),
        "constitution compiled"
    );
    Ok(graph)
}
