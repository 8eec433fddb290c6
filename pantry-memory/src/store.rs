// Copyright 2026 pantry Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt::Debug, hash::BuildHasher, sync::Arc};

use ahash::RandomState;
use hashbrown::HashMap;
use pantry_common::{
    action::{Completion, EntryAction},
    code::{Key, Value},
    entry::{is_expired, now_millis, Change, MutableEntry, Mutation, ETERNAL},
    error::Result,
    operation::Semantic,
    store::EntryStore,
};
use parking_lot::Mutex;

use crate::iter::HeapIter;

pub(crate) struct Slot<V> {
    pub(crate) value: V,
    pub(crate) expire_at: Option<u64>,
}

pub(crate) struct HeapStoreInner<K, V, S> {
    pub(crate) shards: Vec<Mutex<HashMap<K, Slot<V>>>>,
    hash_builder: S,
}

impl<K, V, S> HeapStoreInner<K, V, S>
where
    K: Key,
    V: Value,
    S: BuildHasher + Send + Sync + 'static,
{
    fn hash(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    fn shard(&self, hash: u64) -> usize {
        hash as usize % self.shards.len()
    }

    /// Run `op` on `key` under the shard lock. Recorded changes are committed only if `op` succeeds.
    fn run<O>(&self, key: &K, entry: Option<HeapEntry>, op: O) -> Result<O::Output>
    where
        O: Semantic<K, V>,
    {
        let hash = match entry {
            Some(entry) => {
                debug_assert_eq!(entry.hash, self.hash(key), "entry handle resolved for another key");
                entry.hash
            }
            None => self.hash(key),
        };
        let now = now_millis();

        let mut shard = self.shards[self.shard(hash)].lock();

        if shard.get(key).is_some_and(|slot| is_expired(slot.expire_at, now)) {
            shard.remove(key);
        }
        let current = shard.get(key).map(|slot| (slot.value.clone(), slot.expire_at));

        let mut view = MutableEntry::new(key.clone(), current, now);
        let output = op.apply(&mut view)?;
        Self::commit(&mut shard, key, view.into_mutation(), now);
        Ok(output)
    }

    fn commit(shard: &mut HashMap<K, Slot<V>>, key: &K, mutation: Mutation<V>, now: u64) {
        if mutation.is_empty() {
            return;
        }
        tracing::trace!("[heap store]: commit mutation on key {key:?}");

        let expire_at = mutation.expire_at.filter(|at| *at != ETERNAL);
        match mutation.change {
            Some(Change::Remove) => {
                shard.remove(key);
            }
            Some(Change::Put(value)) => {
                if is_expired(expire_at, now) {
                    shard.remove(key);
                } else {
                    shard.insert(key.clone(), Slot { value, expire_at });
                }
            }
            None => {
                if mutation.expire_at.is_none() {
                    return;
                }
                if is_expired(expire_at, now) {
                    shard.remove(key);
                } else if let Some(slot) = shard.get_mut(key) {
                    slot.expire_at = expire_at;
                }
            }
        }
    }
}

/// Pre-resolved handle of a heap store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapEntry {
    hash: u64,
}

/// Sharded heap entry store.
///
/// Units of work on keys of the same shard are serialized by the shard mutex, so at most one mutating operation
/// applies its effect to a key at a time. The shard lock is held while an operation (including a user entry
/// processor) runs, operations must not call back into the store.
pub struct HeapStore<K, V, S = RandomState> {
    inner: Arc<HeapStoreInner<K, V, S>>,
}

impl<K, V, S> Debug for HeapStore<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapStore").field("shards", &self.inner.shards.len()).finish()
    }
}

impl<K, V, S> Clone for HeapStore<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> HeapStore<K, V, RandomState>
where
    K: Key,
    V: Value,
{
    /// Create a heap store with `shards` shards.
    pub fn new(shards: usize) -> Self {
        Self::with_hash_builder(shards, RandomState::default())
    }
}

impl<K, V> Default for HeapStore<K, V, RandomState>
where
    K: Key,
    V: Value,
{
    fn default() -> Self {
        Self::new(8)
    }
}

impl<K, V, S> HeapStore<K, V, S>
where
    K: Key,
    V: Value,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Create a heap store with `shards` shards and the given hash builder for shard selection.
    pub fn with_hash_builder(shards: usize, hash_builder: S) -> Self {
        let shards = shards.max(1);
        let inner = HeapStoreInner {
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect(),
            hash_builder,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Count of shards.
    pub fn shards(&self) -> usize {
        self.inner.shards.len()
    }
}

/// Unit of work of the [`HeapStore`].
pub struct HeapAction<K, V, S, O>
where
    O: Semantic<K, V>,
{
    inner: Arc<HeapStoreInner<K, V, S>>,
    key: K,
    entry: Option<HeapEntry>,
    op: Option<O>,
    completion: Completion<O::Output>,
}

impl<K, V, S, O> Debug for HeapAction<K, V, S, O>
where
    K: Debug,
    O: Semantic<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapAction")
            .field("key", &self.key)
            .field("entry", &self.entry)
            .field("completion", &self.completion)
            .finish()
    }
}

impl<K, V, S, O> EntryAction for HeapAction<K, V, S, O>
where
    K: Key,
    V: Value,
    S: BuildHasher + Send + Sync + 'static,
    O: Semantic<K, V>,
{
    type Output = O::Output;

    fn start(&mut self) {
        self.completion.begin();
        let outcome = match self.op.take() {
            Some(op) => self.inner.run(&self.key, self.entry, op),
            None => unreachable!("operation is only taken by the first start"),
        };
        self.completion.complete(outcome);
    }

    fn completion(&mut self) -> &mut Completion<Self::Output> {
        &mut self.completion
    }
}

impl<K, V, S> EntryStore<K, V> for HeapStore<K, V, S>
where
    K: Key,
    V: Value,
    S: BuildHasher + Send + Sync + 'static,
{
    type Entry = HeapEntry;
    type Action<O>
        = HeapAction<K, V, S, O>
    where
        O: Semantic<K, V>;
    type Iter = HeapIter<K, V, S>;

    fn resolve(&self, key: &K) -> Self::Entry {
        HeapEntry {
            hash: self.inner.hash(key),
        }
    }

    fn action<O>(&self, key: K, entry: Option<Self::Entry>, op: O, completion: Completion<O::Output>) -> Self::Action<O>
    where
        O: Semantic<K, V>,
    {
        HeapAction {
            inner: self.inner.clone(),
            key,
            entry,
            op: Some(op),
            completion,
        }
    }

    fn iter(&self) -> Self::Iter {
        HeapIter::new(self.inner.clone())
    }

    fn len(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    fn clear(&self) {
        for shard in self.inner.shards.iter() {
            shard.lock().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use pantry_common::{
        action::ActionState,
        entry::NOW,
        error::ErrorKind,
        operation::{Expire, Get, Invoke, Put, Remove},
    };

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<HeapStore<u64, u64>>();
    }

    fn run<O>(store: &HeapStore<u64, u64>, key: u64, op: O) -> Result<O::Output>
    where
        O: Semantic<u64, u64>,
    {
        let mut action = store.action(key, None, op, Completion::synchronous());
        assert_eq!(action.completion().state(), ActionState::Pending);
        action.start();
        assert_eq!(action.completion().state(), ActionState::Completed);
        action.completion().take_outcome()
    }

    #[test_log::test]
    fn test_put_get_remove() {
        let store = HeapStore::<u64, u64>::new(4);
        assert!(store.is_empty());

        run(&store, 1, Put::new(10)).unwrap();
        assert_eq!(run(&store, 1, Get).unwrap(), Some(10));
        assert_eq!(store.len(), 1);

        assert!(run(&store, 1, Remove).unwrap());
        assert!(!run(&store, 1, Remove).unwrap());
        assert_eq!(run(&store, 1, Get).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test_log::test]
    fn test_failed_operation_commits_nothing() {
        let store = HeapStore::<u64, u64>::new(1);
        run(&store, 1, Put::new(10)).unwrap();

        let processor = |e: &mut MutableEntry<u64, u64>| -> anyhow::Result<Option<u64>> {
            e.set_value(20);
            Err(anyhow::anyhow!("boom"))
        };
        let err = run(&store, 1, Invoke::<_, u64>::new(Arc::new(processor))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryProcessing);
        assert_eq!(run(&store, 1, Get).unwrap(), Some(10));
    }

    #[test_log::test]
    fn test_expiry() {
        let store = HeapStore::<u64, u64>::new(2);
        run(&store, 1, Put::with_expiry(10, Some(1))).unwrap();
        assert!(store.is_empty());

        run(&store, 2, Put::with_expiry(20, Some(ETERNAL))).unwrap();
        run(&store, 3, Put::new(30)).unwrap();
        run(&store, 3, Expire::new(NOW)).unwrap();
        assert_eq!(run(&store, 3, Get).unwrap(), None);
        assert_eq!(store.iter().map(|e| *e.key()).collect::<Vec<_>>(), vec![2]);

        run(&store, 4, Expire::new(NOW)).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test_log::test]
    fn test_resolved_entry() {
        let store = HeapStore::<u64, u64>::new(4);
        let entry = store.resolve(&7);
        assert_eq!(entry, store.resolve(&7));

        let mut action = store.action(7, Some(entry), Put::new(70), Completion::synchronous());
        action.start();
        action.completion().take_outcome().unwrap();
        assert_eq!(run(&store, 7, Get).unwrap(), Some(70));
    }

    #[test_log::test]
    fn test_clear() {
        let store = HeapStore::<u64, u64>::new(4);
        for i in 0..16 {
            run(&store, i, Put::new(i)).unwrap();
        }
        assert_eq!(store.len(), 16);
        store.clear();
        assert!(store.is_empty());
    }
}
