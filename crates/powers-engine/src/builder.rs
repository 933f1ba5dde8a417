//! Law graph construction.
//!
//! A DAO constitution is compiled in two phases. Indices are allocated
//! at `append` time (1-based, builder-local counter) so later templates
//! in the same pass can reference earlier laws absolutely; every
//! [`LawRef`] — including forward references to laws not yet appended —
//! is resolved in `build` against the FINAL list length. Several laws
//! routinely reference "the law appended right after me", which is just
//! `LawRef::Relative(1)`.
//!
//! Cycle detection is deliberately absent here: a dependency cycle is a
//! constitution-authoring bug that shows up at evaluation time as
//! perpetual non-satisfaction, never as a crash.

use std::collections::BTreeMap;

use powers_core::{Law, LawConditions, LawGraph, LawId, RoleId};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Known law implementations: law-type name to deployed address.
///
/// Referencing a name with no known address is a fatal configuration
/// error — a partially built constitution is unacceptable.
#[derive(Debug, Default, Clone)]
pub struct LawTypeRegistry {
    types: BTreeMap<String, String>,
}

impl LawTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a law type. Later registrations overwrite earlier ones.
    pub fn register(&mut self, name: impl Into<String>, address: impl Into<String>) {
        self.types.insert(name.into(), address.into());
    }

    /// Builder-style registration.
    pub fn with(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.register(name, address);
        self
    }

    /// Resolve a law-type name to its deployed address.
    pub fn resolve(&self, name: &str) -> EngineResult<&str> {
        self.types
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| EngineError::UnknownLawType {
                name: name.to_string(),
            })
    }

    /// Whether a law type is known.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

/// Reference to another law from a template, before indices are final.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LawRef {
    /// No dependency.
    #[default]
    None,
    /// A known 1-based index (typically returned by an earlier `append`).
    Absolute(LawId),
    /// Offset from this template's own final index: `Relative(1)` is the
    /// law appended right after it, `Relative(-1)` the one just before.
    Relative(i64),
}

impl LawRef {
    /// Resolve against the final graph length. `position` is the
    /// template's 0-based position, used only for error reporting.
    fn resolve(
        &self,
        own_index: LawId,
        position: usize,
        graph_len: usize,
    ) -> EngineResult<Option<LawId>> {
        let resolved = match self {
            LawRef::None => return Ok(None),
            LawRef::Absolute(id) => i64::from(id.0),
            LawRef::Relative(offset) => i64::from(own_index.0) + offset,
        };
        if resolved < 1 || resolved > graph_len as i64 {
            return Err(EngineError::BadReference {
                position,
                resolved,
                graph_len,
            });
        }
        Ok(Some(LawId(resolved as u16)))
    }
}

/// Condition parameters of a template, with dependency fields still
/// symbolic.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConditionTemplate {
    /// Role permitted to invoke or propose the law.
    pub allowed_role: RoleId,
    /// Participation percentage; 0 means the law never votes.
    pub quorum: u8,
    /// Favorable-vote percentage required to pass.
    pub succeed_at: u8,
    /// Blocks a vote stays open.
    pub voting_period: u64,
    /// Blocks between vote end (or authorization) and execution.
    pub delay_execution: u64,
    /// Blocks between successive executions.
    pub throttle_execution: u64,
    /// Fulfilment dependency.
    pub need_completed: LawRef,
    /// Exclusion dependency.
    pub need_not_completed: LawRef,
    /// Informational state source.
    pub read_state_from: LawRef,
}

impl Default for ConditionTemplate {
    fn default() -> Self {
        Self {
            allowed_role: RoleId::PUBLIC,
            quorum: 0,
            succeed_at: 0,
            voting_period: 0,
            delay_execution: 0,
            throttle_execution: 0,
            need_completed: LawRef::None,
            need_not_completed: LawRef::None,
            read_state_from: LawRef::None,
        }
    }
}

/// Specification of one law before index resolution.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LawTemplate {
    /// Human readable name.
    pub name: String,
    /// Longer description shown to voters.
    #[serde(default)]
    pub description: String,
    /// Law-type name, resolved through the registry at build time.
    pub law_type: String,
    /// Opaque configuration payload.
    #[serde(default)]
    pub config: Vec<u8>,
    /// Condition parameters.
    #[serde(default)]
    pub conditions: ConditionTemplate,
}

impl LawTemplate {
    /// Create a template with default (public, unvoted) conditions.
    pub fn new(name: impl Into<String>, law_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            law_type: law_type.into(),
            config: Vec::new(),
            conditions: ConditionTemplate::default(),
        }
    }

    /// Set the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the configuration payload.
    pub fn with_config(mut self, config: Vec<u8>) -> Self {
        self.config = config;
        self
    }

    /// Set the condition parameters.
    pub fn with_conditions(mut self, conditions: ConditionTemplate) -> Self {
        self.conditions = conditions;
        self
    }
}

/// One entry in a data-driven role lineup: emits a structurally
/// identical propose / allocate / end law triple per role, with only the
/// role ids and labels varying.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoleTrackDescriptor {
    /// Role whose members propose and vote on grants of this track.
    pub role: RoleId,
    /// Role that allocates and ends grants once a proposal passes.
    pub allocator_role: RoleId,
    /// Textual label, e.g. "builder", "outreach", "research".
    pub label: String,
    /// Quorum for the propose vote.
    pub quorum: u8,
    /// Success threshold for the propose vote.
    pub succeed_at: u8,
    /// Voting period for the propose vote.
    pub voting_period: u64,
    /// Law type for the propose law.
    pub propose_law_type: String,
    /// Law type for the allocate law.
    pub allocate_law_type: String,
    /// Law type for the end law.
    pub end_law_type: String,
}

/// Append-only builder assembling an ordered law list with symbolic
/// cross-references.
#[derive(Debug, Default, Clone)]
pub struct LawGraphBuilder {
    registry: LawTypeRegistry,
    templates: Vec<LawTemplate>,
}

impl LawGraphBuilder {
    /// Create a builder over a law-type registry.
    pub fn new(registry: LawTypeRegistry) -> Self {
        Self {
            registry,
            templates: Vec::new(),
        }
    }

    /// Index the next `append` will assign.
    ///
    /// Saturates at [`u16::MAX`]; a list that long fails `build` with
    /// [`EngineError::GraphTooLarge`] before any index is resolved.
    pub fn next_index(&self) -> LawId {
        let next = self.templates.len().saturating_add(1);
        LawId(u16::try_from(next).unwrap_or(u16::MAX))
    }

    /// Append a template, assigning its 1-based index immediately so
    /// later templates in the same pass can reference it.
    pub fn append(&mut self, template: LawTemplate) -> LawId {
        let index = self.next_index();
        debug!(%index, name = %template.name, law_type = %template.law_type, "template appended");
        self.templates.push(template);
        index
    }

    /// Emit the propose / allocate / end triple for one role track and
    /// return the three assigned indices in that order.
    ///
    /// The chain is wired through `need_completed`: allocation requires
    /// a fulfilled proposal, ending requires a fulfilled allocation (and
    /// reads its state for the payout bookkeeping).
    pub fn append_role_track(&mut self, track: &RoleTrackDescriptor) -> [LawId; 3] {
        let propose = self.append(
            LawTemplate::new(
                format!("Propose {} grant", track.label),
                track.propose_law_type.clone(),
            )
            .describe(format!(
                "Members of {} propose and vote on a {} grant.",
                track.role, track.label
            ))
            .with_conditions(ConditionTemplate {
                allowed_role: track.role,
                quorum: track.quorum,
                succeed_at: track.succeed_at,
                voting_period: track.voting_period,
                ..Default::default()
            }),
        );

        let allocate = self.append(
            LawTemplate::new(
                format!("Allocate {} grant", track.label),
                track.allocate_law_type.clone(),
            )
            .describe(format!(
                "Allocate funds for a passed {} grant proposal.",
                track.label
            ))
            .with_conditions(ConditionTemplate {
                allowed_role: track.allocator_role,
                need_completed: LawRef::Absolute(propose),
                ..Default::default()
            }),
        );

        let end = self.append(
            LawTemplate::new(
                format!("End {} grant", track.label),
                track.end_law_type.clone(),
            )
            .describe(format!("Close out a {} grant after its last milestone.", track.label))
            .with_conditions(ConditionTemplate {
                allowed_role: track.allocator_role,
                need_completed: LawRef::Absolute(allocate),
                read_state_from: LawRef::Absolute(allocate),
                ..Default::default()
            }),
        );

        [propose, allocate, end]
    }

    /// Resolve every template into a fully indexed law graph.
    ///
    /// All references — forward ones included — are checked against the
    /// final length; any unknown law type or out-of-range reference
    /// fails the entire build.
    pub fn build(self) -> EngineResult<LawGraph> {
        let graph_len = self.templates.len();
        if graph_len > usize::from(u16::MAX) {
            return Err(EngineError::GraphTooLarge { len: graph_len });
        }
        let mut laws = Vec::with_capacity(graph_len);

        for (position, template) in self.templates.into_iter().enumerate() {
            let index = LawId(position as u16 + 1);
            let target_address = self.registry.resolve(&template.law_type)?.to_string();

            for (field, value) in [
                ("quorum", template.conditions.quorum),
                ("succeed_at", template.conditions.succeed_at),
            ] {
                if value > 100 {
                    return Err(EngineError::InvalidPercentage {
                        law_id: index,
                        field,
                        value,
                    });
                }
            }

            let conditions = LawConditions {
                allowed_role: template.conditions.allowed_role,
                quorum: template.conditions.quorum,
                succeed_at: template.conditions.succeed_at,
                voting_period: template.conditions.voting_period,
                delay_execution: template.conditions.delay_execution,
                throttle_execution: template.conditions.throttle_execution,
                need_completed: template
                    .conditions
                    .need_completed
                    .resolve(index, position, graph_len)?,
                need_not_completed: template
                    .conditions
                    .need_not_completed
                    .resolve(index, position, graph_len)?,
                read_state_from: template
                    .conditions
                    .read_state_from
                    .resolve(index, position, graph_len)?,
            };

            laws.push(Law {
                index,
                name: template.name,
                description: template.description,
                law_type: template.law_type,
                target_address,
                config: template.config,
                conditions,
                active: true,
            });
        }

        info!(laws = laws.len(), "law graph built");
        Ok(LawGraph::from_laws(laws))
    }
}
