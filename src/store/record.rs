//! Reference records: stored field values plus calibrated parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{InferError, InferResult, StoreError, StoreResult};
use crate::infer::Parameters;
use crate::network::{Observable, ObservableId};

/// One entry of the reference collection.
///
/// An observable may hold several values (e.g. the names of several
/// synonyms). `accepted` points at the id of the accepted record when this
/// record is a synonym.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub values: BTreeMap<ObservableId, Vec<String>>,
    #[serde(default)]
    pub accepted: Option<String>,
    #[serde(default)]
    pub parameters: Option<Parameters>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
            accepted: None,
            parameters: None,
        }
    }

    pub fn with_value(mut self, observable: impl Into<ObservableId>, value: impl Into<String>) -> Self {
        self.values
            .entry(observable.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_accepted(mut self, accepted: impl Into<String>) -> Self {
        self.accepted = Some(accepted.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn values(&self, observable: &str) -> &[String] {
        self.values.get(observable).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, observable: &str) -> Option<&str> {
        self.values(observable).first().map(String::as_str)
    }

    /// Whether any non-blank value is stored for the observable.
    pub fn has(&self, observable: &str) -> bool {
        self.values(observable).iter().any(|v| !v.trim().is_empty())
    }

    /// Points at a different accepted record.
    pub fn is_synonym(&self) -> bool {
        self.accepted.as_deref().is_some_and(|a| a != self.id)
    }

    /// Tri-state comparison of a query value against the stored values:
    /// `true` if any stored value is equivalent, `None` if nothing comparable
    /// is stored, otherwise `false`.
    pub fn match_value(&self, observable: &Observable, query: &str) -> Option<bool> {
        let analysis = observable.analysis();
        let query = analysis.parse(query)?;
        let mut result = None;
        for raw in self.values(observable.id.as_str()) {
            let Some(stored) = analysis.parse(raw) else {
                continue;
            };
            match analysis.equivalent(&query, &stored) {
                Some(true) => return Some(true),
                Some(false) => result = Some(false),
                None => {}
            }
        }
        result
    }

    pub fn load_parameters(&self) -> InferResult<&Parameters> {
        self.parameters
            .as_ref()
            .ok_or_else(|| InferError::MissingParameters {
                record: self.id.clone(),
            })
    }

    /// Erasure variant the parameters were estimated for.
    pub fn signature(&self) -> &str {
        self.parameters.as_ref().map_or("", Parameters::signature)
    }

    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization {
            message: format!("record {}: {e}", self.id),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> StoreResult<Self> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })
    }
}
