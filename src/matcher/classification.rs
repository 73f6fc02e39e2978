use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::ObservableId;

/// A partially specified query record: observable → raw value.
///
/// Blank values are never stored, so every entry is a field the query
/// actually specifies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ObservableId, String>")]
pub struct Classification(BTreeMap<ObservableId, String>);

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<ObservableId>, value: impl Into<String>) -> Self {
        self.set(id, value);
        self
    }

    /// Set a field. A blank value removes it.
    pub fn set(&mut self, id: impl Into<ObservableId>, value: impl Into<String>) {
        let id = id.into();
        let value = value.into();
        if value.trim().is_empty() {
            self.0.remove(&id);
        } else {
            self.0.insert(id, value);
        }
    }

    /// A copy without `id`, or `None` if the field is not set.
    pub fn without(&self, id: &str) -> Option<Self> {
        if !self.0.contains_key(id) {
            return None;
        }
        let mut copy = self.clone();
        copy.0.remove(id);
        Some(copy)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObservableId, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Readable `id=value` form for logs, fields in id order. Not injective.
impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl<K: Into<ObservableId>, V: Into<String>> FromIterator<(K, V)> for Classification {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut c = Self::new();
        for (k, v) in iter {
            c.set(k, v);
        }
        c
    }
}

impl From<BTreeMap<ObservableId, String>> for Classification {
    fn from(fields: BTreeMap<ObservableId, String>) -> Self {
        fields.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_dropped() {
        let c = Classification::new()
            .with("genus", "Acacia")
            .with("family", "  ");
        assert_eq!(c.len(), 1);
        assert!(!c.contains("family"));
    }

    #[test]
    fn canonical_form_is_ordered() {
        let a: Classification = [("genus", "Acacia"), ("family", "Fabaceae")].into_iter().collect();
        let b: Classification = [("family", "Fabaceae"), ("genus", "Acacia")].into_iter().collect();
        assert_eq!(a.to_string(), "family=Fabaceae; genus=Acacia");
        assert_eq!(a, b);
    }

    #[test]
    fn deserialised_blank_values_are_dropped() {
        let c: Classification =
            serde_json::from_str(r#"{"genus": "  ", "scientificName": "Acacia congesta"}"#).unwrap();
        assert_eq!(c.len(), 1);
        assert!(!c.contains("genus"));
        assert_eq!(
            serde_json::to_string(&c).unwrap(),
            r#"{"scientificName":"Acacia congesta"}"#
        );
    }

    #[test]
    fn values_are_kept_verbatim() {
        let padded = Classification::new().with("genus", "Acacia ");
        let plain = Classification::new().with("genus", "Acacia");
        assert_ne!(padded, plain);
    }

    #[test]
    fn without_removes_only_present_fields() {
        let c = Classification::new().with("genus", "Acacia");
        assert!(c.without("family").is_none());
        assert!(c.without("genus").unwrap().is_empty());
    }
}
