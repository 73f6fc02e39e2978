//! In-memory inverted index over reference records, backed by DashMap.
//!
//! Values are indexed under their folded form (see
//! [`crate::network::analysis::fold`]), so retrieval is insensitive to case,
//! diacritics and spacing. Exact comparison is left to the matcher.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::error::{StoreError, StoreResult};
use crate::matcher::Classification;
use crate::network::ObservableId;
use crate::network::analysis::fold;

use super::Searcher;
use super::durable::DurableStore;
use super::record::Record;

/// Concurrent candidate index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: RwLock<Vec<Arc<Record>>>,
    ids: DashMap<String, usize>,
    postings: DashMap<(ObservableId, String), Vec<usize>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let index = Self::new();
        for r in records {
            index.insert(r);
        }
        index
    }

    /// Load a JSON array of records.
    pub fn load_json(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::Io { source: e })?;
        let records: Vec<Record> =
            serde_json::from_str(&text).map_err(|e| StoreError::Serialization {
                message: format!("{}: {e}", path.display()),
            })?;
        tracing::info!(path = %path.display(), records = records.len(), "records loaded");
        Ok(Self::from_records(records))
    }

    /// Rebuild an index from every record in a durable store.
    pub fn from_store(store: &DurableStore) -> StoreResult<Self> {
        let records = store.records()?;
        tracing::info!(records = records.len(), "index rebuilt from durable store");
        Ok(Self::from_records(records))
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: Record) {
        let record = Arc::new(record);
        let mut records = self.records.write().expect("record index lock poisoned");
        let slot = match self.ids.get(&record.id).map(|s| *s) {
            Some(slot) => {
                let old = records[slot].clone();
                self.unpost(&old, slot);
                records[slot] = record.clone();
                slot
            }
            None => {
                records.push(record.clone());
                let slot = records.len() - 1;
                self.ids.insert(record.id.clone(), slot);
                slot
            }
        };
        for (observable, values) in &record.values {
            for v in values {
                let key = fold(v);
                if key.is_empty() {
                    continue;
                }
                let mut list = self.postings.entry((observable.clone(), key)).or_default();
                if !list.contains(&slot) {
                    list.push(slot);
                }
            }
        }
    }

    fn unpost(&self, record: &Record, slot: usize) {
        for (observable, values) in &record.values {
            for v in values {
                if let Some(mut list) = self.postings.get_mut(&(observable.clone(), fold(v))) {
                    list.retain(|s| *s != slot);
                }
            }
        }
    }

    pub fn record(&self, id: &str) -> Option<Arc<Record>> {
        let slot = *self.ids.get(id)?;
        let records = self.records.read().expect("record index lock poisoned");
        records.get(slot).cloned()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Searcher for MemoryIndex {
    /// Records sharing the most query fields first, then insertion order.
    fn search(&self, query: &Classification, limit: usize) -> StoreResult<Vec<Arc<Record>>> {
        let mut hits: HashMap<usize, usize> = HashMap::new();
        for (observable, value) in query.iter() {
            let key = (observable.clone(), fold(value));
            let slots = self.postings.get(&key).map(|l| l.value().clone()).unwrap_or_default();
            for slot in slots {
                *hits.entry(slot).or_default() += 1;
            }
        }
        let mut ranked: Vec<(usize, usize)> = hits.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let records = self.records.read().expect("record index lock poisoned");
        Ok(ranked
            .into_iter()
            .take(limit)
            .filter_map(|(slot, _)| records.get(slot).cloned())
            .collect())
    }

    fn get(&self, observable: &ObservableId, value: &str) -> StoreResult<Option<Arc<Record>>> {
        // Shard guards are released before `records` is locked; `insert`
        // takes the locks in the opposite order.
        let slot = self
            .postings
            .get(&(observable.clone(), fold(value)))
            .and_then(|l| l.first().copied());
        let Some(slot) = slot else {
            return Ok(None);
        };
        let records = self.records.read().expect("record index lock poisoned");
        Ok(records.get(slot).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> MemoryIndex {
        MemoryIndex::from_records([
            Record::new("1")
                .with_value("scientificName", "Acacia congesta")
                .with_value("genus", "Acacia"),
            Record::new("2")
                .with_value("scientificName", "Acacia dealbata")
                .with_value("genus", "Acacia"),
            Record::new("3").with_value("scientificName", "Banksia serrata"),
        ])
    }

    #[test]
    fn ranks_by_shared_fields() {
        let idx = index();
        let q = Classification::new()
            .with("scientificName", "ACACIA congesta")
            .with("genus", "acacia");
        let hits = idx.search(&q, 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let limited = idx.search(&q, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn get_by_observable() {
        let idx = index();
        let r = idx
            .get(&"scientificName".into(), "Banksia  serrata")
            .unwrap()
            .unwrap();
        assert_eq!(r.id, "3");
        assert!(idx.get(&"genus".into(), "Eucalyptus").unwrap().is_none());
    }

    #[test]
    fn replacing_a_record_drops_old_postings() {
        let idx = index();
        idx.insert(Record::new("3").with_value("scientificName", "Banksia integrifolia"));
        assert_eq!(idx.len(), 3);
        let q = Classification::new().with("scientificName", "Banksia serrata");
        assert!(idx.search(&q, 10).unwrap().is_empty());
        assert_eq!(
            idx.record("3").unwrap().first("scientificName"),
            Some("Banksia integrifolia")
        );
    }

    #[test]
    fn lookups_run_alongside_inserts() {
        let idx = Arc::new(index());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let idx = idx.clone();
                std::thread::spawn(move || {
                    for i in 0..2_000 {
                        if t % 2 == 0 {
                            idx.get(&"genus".into(), "Acacia").unwrap();
                            idx.search(&Classification::new().with("genus", "acacia"), 5)
                                .unwrap();
                        } else {
                            idx.insert(
                                Record::new(format!("{t}-{}", i % 50)).with_value("genus", "Acacia"),
                            );
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(idx.len(), 3 + 2 * 50);
        assert_eq!(idx.get(&"genus".into(), "acacia").unwrap().unwrap().id, "1");
    }
}
