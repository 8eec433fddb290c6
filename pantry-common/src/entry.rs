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

use std::time::{SystemTime, UNIX_EPOCH};

/// Expiry time value that expires an entry immediately.
pub const NOW: u64 = 0;

/// Expiry time value that never expires an entry.
pub const ETERNAL: u64 = u64::MAX;

/// Milliseconds since the unix epoch, the time base of all expiry timestamps.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Whether an entry with the given expiry is expired at `now`.
pub fn is_expired(expire_at: Option<u64>, now: u64) -> bool {
    match expire_at {
        None | Some(ETERNAL) => false,
        Some(at) => at <= now,
    }
}

/// A read-only snapshot of a cache entry, produced by entry iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<K, V> {
    key: K,
    value: V,
    expire_at: Option<u64>,
}

impl<K, V> CacheEntry<K, V> {
    /// Create an entry snapshot.
    pub fn new(key: K, value: V, expire_at: Option<u64>) -> Self {
        Self { key, value, expire_at }
    }

    /// Key of the entry.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Value of the entry.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Expiry timestamp in milliseconds, `None` if the entry does not expire.
    pub fn expire_at(&self) -> Option<u64> {
        self.expire_at
    }

    /// Split the entry into key and value.
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// Pending change of the value of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<V> {
    /// Insert or overwrite the value.
    Put(V),
    /// Remove the entry.
    Remove,
}

/// The effect recorded by an operation on a [`MutableEntry`], committed by the store on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation<V> {
    /// Value change, if any.
    pub change: Option<Change<V>>,
    /// New expiry timestamp, if any. [`ETERNAL`] clears the expiry.
    pub expire_at: Option<u64>,
}

impl<V> Mutation<V> {
    /// Whether the mutation changes nothing.
    pub fn is_empty(&self) -> bool {
        self.change.is_none() && self.expire_at.is_none()
    }
}

/// The entry view an operation works on.
///
/// Changes are recorded, not applied: the store commits them once the operation succeeded and drops them if it
/// failed, so a failing operation never leaves a partial update behind.
#[derive(Debug)]
pub struct MutableEntry<K, V> {
    key: K,
    current: Option<V>,
    current_expire_at: Option<u64>,
    now: u64,

    change: Option<Change<V>>,
    expire_at: Option<u64>,
}

impl<K, V> MutableEntry<K, V> {
    /// Create the view for `key` with its current (unexpired) value and expiry, observed at `now`.
    pub fn new(key: K, current: Option<(V, Option<u64>)>, now: u64) -> Self {
        let (current, current_expire_at) = match current {
            Some((value, expire_at)) => (Some(value), expire_at),
            None => (None, None),
        };
        Self {
            key,
            current,
            current_expire_at,
            now,
            change: None,
            expire_at: None,
        }
    }

    /// Key of the entry.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether the entry exists, taking the recorded changes into account.
    pub fn exists(&self) -> bool {
        self.value().is_some()
    }

    /// Value of the entry, taking the recorded changes into account.
    pub fn value(&self) -> Option<&V> {
        match &self.change {
            Some(Change::Put(value)) => Some(value),
            Some(Change::Remove) => None,
            None => self.current.as_ref(),
        }
    }

    /// Expiry timestamp of the entry, taking the recorded changes into account.
    pub fn expire_at(&self) -> Option<u64> {
        match (&self.change, self.expire_at) {
            (Some(Change::Remove), _) => None,
            (_, Some(ETERNAL)) => None,
            (_, Some(at)) => Some(at),
            (Some(Change::Put(_)), None) => None,
            (None, None) => self.current_expire_at,
        }
    }

    /// Time the operation started at, in milliseconds since the unix epoch.
    pub fn start_time(&self) -> u64 {
        self.now
    }

    /// Insert or overwrite the value.
    pub fn set_value(&mut self, value: V) {
        self.change = Some(Change::Put(value));
    }

    /// Remove the entry.
    pub fn remove(&mut self) {
        self.change = Some(Change::Remove);
        self.expire_at = None;
    }

    /// Set the expiry timestamp of the entry. Has no effect if the entry does not exist when committed.
    pub fn set_expiry(&mut self, expire_at: u64) {
        self.expire_at = Some(expire_at);
    }

    /// The recorded value change, if any.
    pub fn change(&self) -> Option<&Change<V>> {
        self.change.as_ref()
    }

    /// Whether a change has been recorded.
    pub fn is_mutated(&self) -> bool {
        self.change.is_some() || self.expire_at.is_some()
    }

    /// Consume the view into the recorded mutation.
    pub fn into_mutation(self) -> Mutation<V> {
        Mutation {
            change: self.change,
            expire_at: self.expire_at,
        }
    }
}
