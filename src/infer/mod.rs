//! Exact posterior inference over compiled networks.
//!
//! An [`Inferencer`] is built once per compiled variant; each evaluation pairs
//! it with a record's [`Parameters`] and the tri-state [`Evidence`] of one
//! query-versus-candidate comparison.

pub mod evaluator;
pub mod parameters;
pub mod variants;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::network::ObservableId;

pub use evaluator::Inferencer;
pub use parameters::{ParameterValues, Parameters};
pub use variants::NetworkVariants;

/// Tri-state observations keyed by observable.
///
/// An observable absent from the map is unknown and is marginalised over both
/// values during evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evidence(BTreeMap<ObservableId, bool>);

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Evidence::set`] for known values.
    pub fn with(mut self, id: impl Into<ObservableId>, value: bool) -> Self {
        self.0.insert(id.into(), value);
        self
    }

    /// Record an observation. `None` clears it back to unknown.
    pub fn set(&mut self, id: impl Into<ObservableId>, value: Option<bool>) {
        let id = id.into();
        match value {
            Some(v) => {
                self.0.insert(id, v);
            }
            None => {
                self.0.remove(&id);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<bool> {
        self.0.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObservableId, bool)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    /// Number of known observations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when every observable is unknown.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of observations that matched.
    pub fn matched(&self) -> usize {
        self.0.values().filter(|v| **v).count()
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    /// `P(root = true)`.
    pub prior: f64,
    /// `P(evidence | root = true)`.
    pub conditional: f64,
    /// `P(evidence)`.
    pub evidence: f64,
    /// `P(root = true | evidence)`.
    pub posterior: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_clears_observation() {
        let mut e = Evidence::new().with("genus", true).with("family", false);
        assert_eq!(e.len(), 2);
        assert_eq!(e.matched(), 1);
        e.set("genus", None);
        assert_eq!(e.get("genus"), None);
        assert_eq!(e.get("family"), Some(false));
    }

    #[test]
    fn evidence_serialises_as_map() {
        let e = Evidence::new().with("wet", true);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"wet":true}"#);
        let back: Evidence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
