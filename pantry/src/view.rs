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

//! Read-only projections of the primary entry iterator.
//!
//! Views are lazy and forward-only, and not snapshot isolated: entries mutated concurrently may or may not be
//! observed. Removal through a view is not supported, all mutations go through the cache operations.

use std::{fmt::Debug, marker::PhantomData};

use pantry_common::{
    code::{Key, Value},
    entry::CacheEntry,
    error::{Error, Result},
    store::EntryStore,
};

/// Entry view, the primary entry iterator of the store.
pub struct Entries<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    iter: S::Iter,
    _marker: PhantomData<fn(K, V)>,
}

impl<K, V, S> Debug for Entries<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entries").finish()
    }
}

impl<K, V, S> Entries<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    pub(crate) fn new(store: &S) -> Self {
        Self {
            iter: store.iter(),
            _marker: PhantomData,
        }
    }

    /// Remove the entry last returned.
    ///
    /// Always fails with [`ErrorKind::Unsupported`](pantry_common::error::ErrorKind::Unsupported).
    pub fn remove(&mut self) -> Result<()> {
        Err(Error::unsupported("Entries::remove"))
    }
}

impl<K, V, S> Iterator for Entries<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    type Item = CacheEntry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

/// Key view, the keys of the [`Entries`] view.
pub struct Keys<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    entries: Entries<K, V, S>,
}

impl<K, V, S> Debug for Keys<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys").finish()
    }
}

impl<K, V, S> Keys<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    pub(crate) fn new(store: &S) -> Self {
        Self {
            entries: Entries::new(store),
        }
    }

    /// Remove the key last returned.
    ///
    /// Always fails with [`ErrorKind::Unsupported`](pantry_common::error::ErrorKind::Unsupported).
    pub fn remove(&mut self) -> Result<()> {
        Err(Error::unsupported("Keys::remove"))
    }
}

impl<K, V, S> Iterator for Keys<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|entry| entry.into_parts().0)
    }
}
