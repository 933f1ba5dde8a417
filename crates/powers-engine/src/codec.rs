//! Calldata codec seam.
//!
//! The engine never interprets calldata contents; encoding exists only
//! so a deterministic [`ActionId`] can be derived from a parameter list.
//! [`JsonCodec`] is the default implementation; on-chain deployments
//! substitute their own ABI codec behind the same trait.

use powers_core::{ActionId, LawId, ParamKind, ParamSpec};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Serializes and deserializes law parameters against their specs.
pub trait Codec: Send + Sync {
    /// Encode `values` per `specs` into canonical bytes.
    fn encode(&self, specs: &[ParamSpec], values: &[Value]) -> EngineResult<Vec<u8>>;

    /// Decode bytes back into values, validated against `specs`.
    fn decode(&self, specs: &[ParamSpec], bytes: &[u8]) -> EngineResult<Vec<Value>>;
}

/// Canonical JSON encoding of the value list.
///
/// serde_json's compact output is deterministic for a fixed value
/// sequence, which is all the id derivation needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    fn check(spec: &ParamSpec, value: &Value) -> EngineResult<()> {
        if !kind_matches(&spec.kind, value) {
            return Err(EngineError::CalldataMismatch {
                name: spec.name.clone(),
                message: format!("value {value} does not match kind {:?}", spec.kind),
            });
        }
        Ok(())
    }

    fn check_all(specs: &[ParamSpec], values: &[Value]) -> EngineResult<()> {
        if specs.len() != values.len() {
            return Err(EngineError::CalldataMismatch {
                name: "<arity>".to_string(),
                message: format!("expected {} values, got {}", specs.len(), values.len()),
            });
        }
        for (spec, value) in specs.iter().zip(values) {
            Self::check(spec, value)?;
        }
        Ok(())
    }
}

fn kind_matches(kind: &ParamKind, value: &Value) -> bool {
    match kind {
        ParamKind::Address | ParamKind::Str | ParamKind::Bytes => value.is_string(),
        ParamKind::Uint => value.is_u64(),
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Array(inner) => value
            .as_array()
            .is_some_and(|items| items.iter().all(|item| kind_matches(inner, item))),
    }
}

impl Codec for JsonCodec {
    fn encode(&self, specs: &[ParamSpec], values: &[Value]) -> EngineResult<Vec<u8>> {
        Self::check_all(specs, values)?;
        Ok(serde_json::to_vec(values)?)
    }

    fn decode(&self, specs: &[ParamSpec], bytes: &[u8]) -> EngineResult<Vec<Value>> {
        let values: Vec<Value> = serde_json::from_slice(bytes)?;
        Self::check_all(specs, &values)?;
        Ok(values)
    }
}

/// Derive an action id for a parameter list in one step: encode the
/// values with `codec`, then hash `(law, calldata, nonce)`.
pub fn derive_action_id(
    codec: &dyn Codec,
    law_id: LawId,
    specs: &[ParamSpec],
    values: &[Value],
    nonce: u64,
) -> EngineResult<ActionId> {
    let calldata = codec.encode(specs, values)?;
    Ok(ActionId::derive(law_id, &calldata, nonce))
}
