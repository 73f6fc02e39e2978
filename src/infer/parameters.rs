//! Per-record parameter vectors and their expansion into a dense value table.

use serde::{Deserialize, Serialize};

use crate::compile::{CompiledNetwork, InferenceParameter, ParameterId, ParameterSchema};
use crate::error::{InferError, InferResult};

/// Base parameter values for one network variant, in schema order.
///
/// The vector is unlabelled, so it carries the schema tag and variant
/// signature it was produced for. Both are checked before evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    tag: String,
    signature: String,
    values: Vec<f64>,
}

impl Parameters {
    /// Wrap `values` for `schema`, checking the length.
    pub fn new(schema: &ParameterSchema, values: Vec<f64>) -> InferResult<Self> {
        if values.len() != schema.len() {
            return Err(InferError::LengthMismatch {
                expected: schema.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            tag: schema.tag.clone(),
            signature: schema.signature.clone(),
            values,
        })
    }

    /// Build a vector by evaluating `value` for each base parameter.
    pub fn from_fn(
        network: &CompiledNetwork,
        mut value: impl FnMut(&InferenceParameter) -> f64,
    ) -> Self {
        let schema = network.schema();
        Self {
            tag: schema.tag.clone(),
            signature: schema.signature.clone(),
            values: schema
                .base
                .iter()
                .map(|id| value(network.parameter(*id)))
                .collect(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check tag and length against a schema.
    pub fn check(&self, schema: &ParameterSchema) -> InferResult<()> {
        if self.tag != schema.tag {
            return Err(InferError::SchemaMismatch {
                expected: schema.tag.clone(),
                stored: self.tag.clone(),
            });
        }
        if self.values.len() != schema.len() {
            return Err(InferError::LengthMismatch {
                expected: schema.len(),
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> InferResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| InferError::Decode {
            message: format!("encode failed: {e}"),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> InferResult<Self> {
        bincode::deserialize(bytes).map_err(|e| InferError::Decode {
            message: e.to_string(),
        })
    }
}

/// Dense value of every parameter of a compiled network, indexed by
/// [`ParameterId`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValues(Vec<f64>);

impl ParameterValues {
    /// Expand base values through complements and derivations.
    ///
    /// Derivations only reference parameters created earlier, so one pass in
    /// id order suffices.
    pub fn expand(network: &CompiledNetwork, parameters: &Parameters) -> InferResult<Self> {
        let schema = network.schema();
        parameters.check(schema)?;

        let mut values = vec![0.0; network.parameters().len()];
        let mut base = parameters.values.iter();
        for p in network.parameters() {
            let v = if p.is_base() {
                // length checked above
                base.next().copied().unwrap_or(0.0)
            } else {
                let product: f64 = p.derived_from.iter().map(|d| values[d.index()]).product();
                if p.inverted { 1.0 - product } else { product }
            };
            values[p.id.index()] = v;
        }
        Ok(Self(values))
    }

    pub fn get(&self, id: ParameterId) -> f64 {
        self.0[id.index()]
    }

    pub(crate) fn at(&self, index: usize) -> f64 {
        self.0[index]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
