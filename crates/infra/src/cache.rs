//! Bounded key-value cache with least-recently-used eviction.
//!
//! Independent of the ledger: nothing in the stock path reads from or writes
//! to it.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use stockledger_core::DomainError;

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, V>,
    /// Front = least recently used.
    order: VecDeque<K>,
}

/// Thread-safe fixed-capacity LRU cache.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: usize) -> Result<Self, DomainError> {
        if capacity == 0 {
            return Err(DomainError::validation("cache capacity must be positive"));
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or replace a value, marking it most recently used. Evicts the
    /// least recently used entry when full.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.lock();
        if inner.entries.insert(key.clone(), value).is_some() {
            touch(&mut inner.order, &key);
            return;
        }
        inner.order.push_back(key);
        if inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            }
        }
    }

    /// Look up a value, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let value = inner.entries.get(key).cloned()?;
        touch(&mut inner.order, key);
        Some(value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let value = inner.entries.remove(key)?;
        inner.order.retain(|k| k != key);
        Some(value)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, least recently used first.
    pub fn entries(&self) -> Vec<(K, V)> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|k| inner.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Poisoning is ignored: a panicking holder can at worst leave a stale
    /// recency entry behind.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for LruCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }
}

fn touch<K: Eq>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}
