//! Inference parameters: identity and shape of conditional probability terms.
//!
//! The compiler only decides which parameters exist and how they relate. Their
//! numeric values arrive later as a [`crate::infer::Parameters`] vector holding
//! one value per *base* parameter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::ObservableId;

/// One literal of a conditional probability expression, e.g. `genus = true`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Contributor {
    pub observable: ObservableId,
    pub value: bool,
}

impl Contributor {
    pub fn new(observable: impl Into<ObservableId>, value: bool) -> Self {
        Self {
            observable: observable.into(),
            value,
        }
    }
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value {
            write!(f, "{}", self.observable)
        } else {
            write!(f, "!{}", self.observable)
        }
    }
}

/// Index into a compiled network's parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterId(usize);

impl ParameterId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// `P(v)` for the input vertex, or its complement.
    Prior,
    /// `P(v | parents = sig)`, or its complement.
    Conditional,
    /// Product over a horizon signature.
    Derived,
}

/// A conditional probability term.
///
/// Inverted parameters evaluate to `1 - product(derived_from)`; non-inverted
/// parameters with a derivation evaluate to `product(derived_from)`. All others
/// are base parameters whose values are supplied externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParameter {
    pub id: ParameterId,
    pub kind: ParameterKind,
    pub outcome: Contributor,
    pub contributors: Vec<Contributor>,
    pub derived_from: Vec<ParameterId>,
    pub inverted: bool,
}

impl InferenceParameter {
    pub fn is_base(&self) -> bool {
        !self.inverted && self.derived_from.is_empty()
    }

    /// Diagnostic notation, e.g. `p(wet | rain, !sprinkler)`.
    pub fn formula(&self) -> String {
        if self.contributors.is_empty() {
            return format!("p({})", self.outcome);
        }
        let given: Vec<String> = self.contributors.iter().map(ToString::to_string).collect();
        format!("p({} | {})", self.outcome, given.join(", "))
    }

    /// Key for exact contributor-set lookup: outcome plus contributors sorted
    /// by observable.
    pub(crate) fn lookup_key(&self) -> (Contributor, Vec<Contributor>) {
        lookup_key(&self.outcome, &self.contributors)
    }
}

pub(crate) fn lookup_key(
    outcome: &Contributor,
    contributors: &[Contributor],
) -> (Contributor, Vec<Contributor>) {
    let mut sorted = contributors.to_vec();
    sorted.sort();
    (outcome.clone(), sorted)
}

impl fmt::Display for InferenceParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.formula())
    }
}

/// The base parameters of one compiled variant, in storage order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Stable hash of the full parameter table.
    pub tag: String,
    /// Erasure variant signature (`T`/`F` per group).
    pub signature: String,
    pub base: Vec<ParameterId>,
}

impl ParameterSchema {
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

/// FNV-1a over the formulas and derivations of every parameter.
pub(crate) fn schema_tag(parameters: &[InferenceParameter]) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    let mut feed = |bytes: &[u8]| {
        for b in bytes {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(PRIME);
        }
    };
    for p in parameters {
        feed(p.formula().as_bytes());
        for d in &p.derived_from {
            feed(&(d.index() as u64).to_le_bytes());
        }
        feed(if p.inverted { b"~\n" } else { b"\n" });
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(outcome: Contributor, contributors: Vec<Contributor>) -> InferenceParameter {
        InferenceParameter {
            id: ParameterId::new(0),
            kind: ParameterKind::Conditional,
            outcome,
            contributors,
            derived_from: Vec::new(),
            inverted: false,
        }
    }

    #[test]
    fn formula_notation() {
        let p = param(
            Contributor::new("wet", true),
            vec![Contributor::new("rain", true), Contributor::new("sprinkler", false)],
        );
        assert_eq!(p.formula(), "p(wet | rain, !sprinkler)");
        assert!(p.is_base());

        let prior = param(Contributor::new("rain", false), Vec::new());
        assert_eq!(prior.formula(), "p(!rain)");
    }

    #[test]
    fn lookup_key_ignores_contributor_order() {
        let a = param(
            Contributor::new("wet", true),
            vec![Contributor::new("rain", true), Contributor::new("sprinkler", false)],
        );
        let b = param(
            Contributor::new("wet", true),
            vec![Contributor::new("sprinkler", false), Contributor::new("rain", true)],
        );
        assert_eq!(a.lookup_key(), b.lookup_key());
    }

    #[test]
    fn schema_tag_tracks_structure() {
        let a = vec![param(Contributor::new("rain", true), Vec::new())];
        let mut b = a.clone();
        assert_eq!(schema_tag(&a), schema_tag(&b));
        b[0].inverted = true;
        assert_ne!(schema_tag(&a), schema_tag(&b));
        assert_eq!(schema_tag(&a).len(), 16);
    }
}
