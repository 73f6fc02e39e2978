//! Reference collection storage and candidate search.
//!
//! Two backends serve different access patterns:
//!
//! - [`MemoryIndex`]: concurrent inverted index (DashMap) used for search
//! - [`DurableStore`]: records persisted in ACID transactions (redb)
//!
//! The matcher only sees the [`Searcher`] trait. [`open_searcher`] resolves
//! the configured [`SearcherKind`] to a concrete backend at startup.

pub mod durable;
pub mod mem;
pub mod record;

use std::sync::Arc;

use crate::config::SearcherKind;
use crate::error::StoreResult;
use crate::matcher::Classification;
use crate::network::ObservableId;

pub use durable::DurableStore;
pub use mem::MemoryIndex;
pub use record::Record;

/// Candidate retrieval over the reference collection. Read-only during
/// matching and safe to share across threads.
pub trait Searcher: Send + Sync {
    /// Up to `limit` plausible candidates for the non-empty query fields,
    /// most relevant first.
    fn search(&self, query: &Classification, limit: usize) -> StoreResult<Vec<Arc<Record>>>;

    /// The record whose `observable` holds `value`, if any.
    fn get(&self, observable: &ObservableId, value: &str) -> StoreResult<Option<Arc<Record>>>;
}

/// Build the configured searcher.
pub fn open_searcher(kind: &SearcherKind) -> StoreResult<Arc<dyn Searcher>> {
    let index = match kind {
        SearcherKind::Memory { records } => MemoryIndex::load_json(records)?,
        SearcherKind::Durable { path } => MemoryIndex::from_store(&DurableStore::open(path)?)?,
    };
    tracing::info!(kind = kind.name(), records = index.len(), "searcher ready");
    Ok(Arc::new(index))
}
