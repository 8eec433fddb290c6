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

use std::fmt::Debug;

use crate::{
    action::{Completion, EntryAction},
    code::{Key, Value},
    entry::CacheEntry,
    operation::Semantic,
};

/// The entry table the dispatch core runs its units of work against.
///
/// The store owns the storage slots. Actions it builds must serialize mutating operations on the same key, the
/// dispatch core relies on it and holds no locks of its own.
pub trait EntryStore<K, V>: Send + Sync + 'static
where
    K: Key,
    V: Value,
{
    /// Pre-resolved handle of an entry, lets call sites that already located an entry skip the lookup.
    type Entry: Send + Clone + Debug + 'static;

    /// Unit of work binding an operation to a key.
    type Action<O>: EntryAction<Output = O::Output> + 'static
    where
        O: Semantic<K, V>;

    /// Primary entry iterator. Lazy and not snapshot isolated.
    type Iter: Iterator<Item = CacheEntry<K, V>> + Send + 'static;

    /// Resolve the entry handle of `key`.
    fn resolve(&self, key: &K) -> Self::Entry;

    /// Build the unit of work for `op` on `key`. The action is returned in `Pending` state.
    fn action<O>(&self, key: K, entry: Option<Self::Entry>, op: O, completion: Completion<O::Output>) -> Self::Action<O>
    where
        O: Semantic<K, V>;

    /// Iterate over the unexpired entries.
    fn iter(&self) -> Self::Iter;

    /// Count of stored entries, expired entries not yet purged included.
    fn len(&self) -> usize;

    /// Whether the store holds no entry.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    fn clear(&self);
}
