//! Bounded, thread-safe memo table with FIFO eviction.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Mutex;

use dashmap::DashMap;

/// Concurrent map holding at most `capacity` entries. When full, the oldest
/// inserted key is evicted. Re-inserting an existing key replaces its value
/// without refreshing its position.
#[derive(Debug)]
pub struct BoundedCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
    order: Mutex<VecDeque<K>>,
    capacity: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A cache of `capacity` entries. Capacity 0 stores nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut order = self.order.lock().expect("cache order lock poisoned");
        if self.entries.insert(key.clone(), value).is_none() {
            order.push_back(key);
        }
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    pub fn clear(&self) {
        let mut order = self.order.lock().expect("cache order lock poisoned");
        order.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
