//! Per-key asynchronous memoization
//!
//! Each key maps to one shared computation. The first request spawns the work
//! as its own task; every later request for the same key (while it runs or
//! after it finished) waits on that same task instead of starting another.
//!
//! Failures are memoized like successes. A key whose work failed keeps
//! answering with the same error until it is explicitly [`WorkCache::delete`]d.

use crate::error::{AnalysisError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use tokio_util::sync::CancellationToken;

/// Handle on a (possibly still running) cached computation
pub type SharedWork<V> = Shared<BoxFuture<'static, Result<V>>>;

pub struct WorkCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    entries: DashMap<K, SharedWork<V>>,
}

impl<K, V> WorkCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Snapshot of `parent`'s entries. In-flight entries stay shared with the
    /// parent; later inserts and deletes on either side are independent.
    pub fn from_parent(parent: &Self) -> Self {
        let entries = parent
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Self { entries }
    }

    /// Start `work` for `key` unless an entry already exists, and return the
    /// shared handle without waiting on it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn compute<F, Fut>(&self, key: K, work: F) -> SharedWork<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        match self.entries.entry(key) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let handle = tokio::spawn(work());
                let shared = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(join_error) => Err(AnalysisError::task_failed(join_error)),
                    }
                }
                .boxed()
                .shared();
                slot.insert(shared.clone());
                shared
            }
        }
    }

    /// Return the cached result for `key`, computing it with `work` if this
    /// is the first request.
    ///
    /// Cancelling `cancel` only releases this caller: the work keeps running
    /// for everybody else waiting on the key.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: K,
        work: F,
        cancel: &CancellationToken,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        let shared = self.compute(key, work);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
            result = shared => result,
        }
    }

    /// Seed an already computed value
    pub fn insert_ready(&self, key: K, value: V) {
        let ready = futures::future::ready(Ok(value)).boxed().shared();
        // `Shared::peek` only sees output once something has polled it.
        let _ = ready.clone().now_or_never();
        self.entries.insert(key, ready);
    }

    /// Handle on `key`'s work, without starting any
    pub fn get(&self, key: &K) -> Option<SharedWork<V>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Result for `key` if its work has finished
    pub fn get_completed(&self, key: &K) -> Option<Result<V>> {
        self.entries.get(key).and_then(|entry| entry.value().peek().cloned())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_complete(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.value().peek().is_some())
            .unwrap_or(false)
    }

    pub fn delete(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for WorkCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for WorkCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self::from_parent(self)
    }
}
