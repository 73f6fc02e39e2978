//! Erasure variants: one compiled network per subset of optional groups.
//!
//! Records often lack whole groups of fields (no authorship, no rank). Such a
//! record's parameters are estimated against the sub-network without those
//! vertices, and it is evaluated with that variant's [`Inferencer`]. Variants
//! are keyed by a signature string with one `T` (present) or `F` (erased) per
//! declared erasure group.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::compile::NetworkCompiler;
use crate::error::{CompileResult, InferError, InferResult};
use crate::network::{ErasureGroup, NetworkDefinition, ObservableId, Signature};

use super::Inferencer;

/// Every erasure variant of one network definition.
#[derive(Debug, Clone)]
pub struct NetworkVariants {
    name: String,
    groups: Vec<ErasureGroup>,
    variants: BTreeMap<String, Arc<Inferencer>>,
}

impl NetworkVariants {
    /// Validate the definition and compile all `2^groups` variants.
    pub fn compile(definition: &NetworkDefinition) -> CompileResult<Self> {
        let full = definition.graph()?;
        let groups = definition.erasures.clone();

        let mut variants = BTreeMap::new();
        for sig in Signature::all(groups.len()) {
            let erased: BTreeSet<ObservableId> = groups
                .iter()
                .zip(sig.bits())
                .filter(|(_, present)| !**present)
                .flat_map(|(g, _)| g.observables.iter().cloned())
                .collect();
            let key = sig.to_string();
            let graph = if erased.is_empty() {
                full.clone()
            } else {
                full.erase(&erased)?
            };
            let compiled = NetworkCompiler::analyse_variant(&graph, &key)?;
            tracing::debug!(variant = %key, erased = erased.len(), "variant compiled");
            variants.insert(key, Arc::new(Inferencer::new(Arc::new(compiled))));
        }

        tracing::info!(
            network = %definition.name,
            variants = variants.len(),
            "network variants ready"
        );
        Ok(Self {
            name: definition.name.clone(),
            groups,
            variants,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[ErasureGroup] {
        &self.groups
    }

    /// The variant with nothing erased.
    pub fn full_signature(&self) -> String {
        "T".repeat(self.groups.len())
    }

    pub fn full(&self) -> InferResult<&Arc<Inferencer>> {
        self.variant(&self.full_signature())
    }

    /// Select a variant by signature string.
    pub fn variant(&self, signature: &str) -> InferResult<&Arc<Inferencer>> {
        self.variants
            .get(signature)
            .ok_or_else(|| InferError::UnknownVariant {
                signature: signature.to_string(),
            })
    }

    /// Signature for a record: a group is present when `present` holds for at
    /// least one of its observables.
    pub fn signature_for(&self, present: impl Fn(&ObservableId) -> bool) -> String {
        let bits = self
            .groups
            .iter()
            .map(|g| g.observables.iter().any(&present))
            .collect();
        Signature::new(bits).to_string()
    }

    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
