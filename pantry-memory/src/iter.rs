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

use std::{fmt::Debug, sync::Arc};

use pantry_common::{
    code::{Key, Value},
    entry::{is_expired, now_millis, CacheEntry},
};

use crate::store::HeapStoreInner;

/// Entry iterator of the [`HeapStore`](crate::HeapStore).
///
/// Shards are visited one after another. A shard is copied out under its lock when the iterator reaches it, so
/// changes to shards not visited yet are observed and changes to visited shards are not. No lock is held between
/// calls to `next`.
pub struct HeapIter<K, V, S> {
    inner: Arc<HeapStoreInner<K, V, S>>,
    shard: usize,
    buffer: std::vec::IntoIter<CacheEntry<K, V>>,
}

impl<K, V, S> Debug for HeapIter<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapIter")
            .field("shard", &self.shard)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl<K, V, S> HeapIter<K, V, S> {
    pub(crate) fn new(inner: Arc<HeapStoreInner<K, V, S>>) -> Self {
        Self {
            inner,
            shard: 0,
            buffer: Vec::new().into_iter(),
        }
    }
}

impl<K, V, S> Iterator for HeapIter<K, V, S>
where
    K: Key,
    V: Value,
{
    type Item = CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.next() {
                return Some(entry);
            }
            if self.shard >= self.inner.shards.len() {
                return None;
            }

            let now = now_millis();
            let entries = self.inner.shards[self.shard]
                .lock()
                .iter()
                .filter(|(_, slot)| !is_expired(slot.expire_at, now))
                .map(|(key, slot)| CacheEntry::new(key.clone(), slot.value.clone(), slot.expire_at))
                .collect::<Vec<_>>();
            self.shard += 1;
            self.buffer = entries.into_iter();
        }
    }
}
