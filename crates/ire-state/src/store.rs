//! # Record Store
//!
//! Thread-safe, cloneable in-memory map used to hold alerts and approvals.
//!
//! All operations are synchronous (the lock is `parking_lot`, not
//! `tokio::sync`) because the lock is never held across an `.await`.
//! `parking_lot::RwLock` does not poison, so a panicking writer cannot wedge
//! the store for every later caller.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Keyed record store with atomic read-validate-update.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, T> Store<K, T>
where
    K: Copy + Eq + Hash,
    T: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Clone every record matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure runs under the write lock, so inspection and mutation are
    /// a single compare-and-set step. Returns `None` if the record does not
    /// exist, otherwise the closure's result.
    pub fn try_update<R, E>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Default for Store<K, T>
where
    K: Copy + Eq + Hash,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
