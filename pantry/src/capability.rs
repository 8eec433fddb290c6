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

//! Capability negotiation.
//!
//! Callers ask a cache for an access shape with [`Cache::request_interface`]. Map shapes are served by fresh
//! adapters over the cache, other shapes by the cache itself if it provides them.

use std::{fmt::Debug, ops::Deref};

use bitflags::bitflags;
use pantry_common::{
    code::{Key, Value},
    error::Result,
    store::EntryStore,
};

use crate::{
    cache::Cache,
    view::{Entries, Keys},
};

bitflags! {
    /// Access shapes a cache instance provides by itself.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Single-key cache operations and batch invocation.
        const CACHE = 1;
        /// Key and entry views.
        const ITERATION = 1 << 1;
        /// Asynchronous execution on a configured spawner.
        const ASYNC = 1 << 2;
        /// A secondary storage tier is attached.
        const STORAGE = 1 << 3;
        /// Mutations are forwarded to a cache writer.
        const WRITE_THROUGH = 1 << 4;
    }
}

/// Access shape requested from a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// Map view, see [`MapView`].
    Map,
    /// Concurrent map view, see [`ConcurrentMapView`].
    ConcurrentMap,
    /// The cache itself.
    Cache,
    /// Key and entry iteration.
    Iteration,
    /// Asynchronous execution.
    AsyncExecution,
    /// Secondary storage.
    StorageBacked,
    /// Write-through.
    WriteThrough,
}

impl Interface {
    /// Capabilities the cache must have to serve the shape by itself.
    pub fn required(&self) -> Capabilities {
        match self {
            Interface::Map | Interface::ConcurrentMap => Capabilities::empty(),
            Interface::Cache => Capabilities::CACHE,
            Interface::Iteration => Capabilities::ITERATION,
            Interface::AsyncExecution => Capabilities::ASYNC,
            Interface::StorageBacked => Capabilities::STORAGE,
            Interface::WriteThrough => Capabilities::WRITE_THROUGH,
        }
    }
}

/// A served access shape.
pub enum CacheInterface<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    /// A fresh map adapter.
    Map(MapView<K, V, S>),
    /// A fresh concurrent map adapter.
    ConcurrentMap(ConcurrentMapView<K, V, S>),
    /// The cache itself.
    Cache(Cache<K, V, S>),
}

impl<K, V, S> Debug for CacheInterface<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Map(view) => f.debug_tuple("Map").field(view).finish(),
            Self::ConcurrentMap(view) => f.debug_tuple("ConcurrentMap").field(view).finish(),
            Self::Cache(cache) => f.debug_tuple("Cache").field(cache).finish(),
        }
    }
}

impl<K, V, S> CacheInterface<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    /// The served cache, if the cache itself serves the shape.
    pub fn into_cache(self) -> Option<Cache<K, V, S>> {
        match self {
            Self::Cache(cache) => Some(cache),
            Self::Map(_) | Self::ConcurrentMap(_) => None,
        }
    }

    /// The served map adapter, if any.
    pub fn into_map(self) -> Option<MapView<K, V, S>> {
        match self {
            Self::Map(view) => Some(view),
            Self::ConcurrentMap(view) => Some(view.map),
            Self::Cache(_) => None,
        }
    }

    /// The served concurrent map adapter, if any.
    pub fn into_concurrent_map(self) -> Option<ConcurrentMapView<K, V, S>> {
        match self {
            Self::ConcurrentMap(view) => Some(view),
            Self::Map(_) | Self::Cache(_) => None,
        }
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    /// Access shapes this cache instance provides by itself.
    pub fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::CACHE | Capabilities::ITERATION;
        capabilities.set(Capabilities::ASYNC, self.dispatcher().spawner().is_some());
        capabilities.set(Capabilities::STORAGE, self.storage().is_some());
        capabilities.set(Capabilities::WRITE_THROUGH, self.has_writer());
        capabilities
    }

    /// Serve `interface`.
    ///
    /// Map shapes always get a freshly constructed adapter. Other shapes are served by the cache itself if it has
    /// the required capabilities, and are `None` otherwise.
    pub fn request_interface(&self, interface: Interface) -> Option<CacheInterface<K, V, S>> {
        match interface {
            Interface::Map => Some(CacheInterface::Map(MapView::new(self.clone()))),
            Interface::ConcurrentMap => Some(CacheInterface::ConcurrentMap(ConcurrentMapView::new(self.clone()))),
            _ if self.capabilities().contains(interface.required()) => Some(CacheInterface::Cache(self.clone())),
            _ => None,
        }
    }

    /// The cache as a concurrent map.
    pub fn as_map(&self) -> ConcurrentMapView<K, V, S> {
        ConcurrentMapView::new(self.clone())
    }
}

/// Map-shaped adapter over a cache.
///
/// Every call goes through the cache operations, the adapter holds no state of its own.
pub struct MapView<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    cache: Cache<K, V, S>,
}

impl<K, V, S> Debug for MapView<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView").field("cache", &self.cache).finish()
    }
}

impl<K, V, S> MapView<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn new(cache: Cache<K, V, S>) -> Self {
        Self { cache }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &Cache<K, V, S> {
        &self.cache
    }

    /// Get the value of `key`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.cache.get(key)
    }

    /// Whether `key` has a value.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.cache.contains_key(key)
    }

    /// Set the value of `key`, return the previous value.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        self.cache.get_and_put(key, value)
    }

    /// Remove `key`, return its value.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.cache.get_and_remove(key)
    }

    /// Count of entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Key view.
    pub fn keys(&self) -> Result<Keys<K, V, S>> {
        self.cache.keys()
    }

    /// Entry view.
    pub fn iter(&self) -> Result<Entries<K, V, S>> {
        self.cache.entries()
    }

    /// Remove all entries.
    pub fn clear(&self) -> Result<()> {
        self.cache.clear()
    }
}

/// Concurrent-map-shaped adapter over a cache, with atomic conditional updates.
pub struct ConcurrentMapView<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    map: MapView<K, V, S>,
}

impl<K, V, S> Debug for ConcurrentMapView<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentMapView").field("cache", &self.map.cache).finish()
    }
}

impl<K, V, S> Deref for ConcurrentMapView<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    type Target = MapView<K, V, S>;

    fn deref(&self) -> &Self::Target {
        &self.map
    }
}

impl<K, V, S> ConcurrentMapView<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn new(cache: Cache<K, V, S>) -> Self {
        Self {
            map: MapView::new(cache),
        }
    }

    /// Set the value of `key` if it has none. Returns the present value, `None` if the value was set.
    pub fn put_if_absent(&self, key: K, value: V) -> Result<Option<V>> {
        self.map.cache.put_if_absent_get(key, value)
    }

    /// Overwrite the value of `key` if it has one. Returns the replaced value.
    pub fn replace(&self, key: K, value: V) -> Result<Option<V>> {
        self.map.cache.replace_get(key, value)
    }

    /// Overwrite the value of `key` if it equals `expected`.
    pub fn replace_if_equals(&self, key: K, expected: V, value: V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.map.cache.replace_if_equals(key, expected, value)
    }

    /// Remove `key` if its value equals `expected`.
    pub fn remove_if_equals(&self, key: &K, expected: V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.map.cache.remove_if_equals(key, expected)
    }
}
