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

//! Utilities for testing.

use std::{
    fmt::Debug,
    sync::atomic::{AtomicUsize, Ordering},
};

use pantry_common::code::{Key, Value};
use parking_lot::Mutex;

use crate::customization::{CacheWriter, Customization, Releasable};

/// Error raised by the test customizations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("injected failure: {0}")]
pub struct InjectedError(pub String);

/// A cache writer that records all writes and deletes, and releases with a count.
#[derive(Debug)]
pub struct RecordingWriter<K, V> {
    writes: Mutex<Vec<(K, V)>>,
    deletes: Mutex<Vec<K>>,
    fail_on: Option<String>,
    fail_release: bool,
    releases: AtomicUsize,
}

impl<K, V> Default for RecordingWriter<K, V> {
    fn default() -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            fail_on: None,
            fail_release: false,
            releases: AtomicUsize::new(0),
        }
    }
}

impl<K, V> RecordingWriter<K, V>
where
    K: Key,
    V: Value,
{
    /// Fail writes and deletes of the key whose debug rendering, quotes trimmed, is `key`.
    pub fn fail_on(mut self, key: impl Into<String>) -> Self {
        self.fail_on = Some(key.into());
        self
    }

    /// Fail the release.
    pub fn fail_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Recorded writes, in order.
    pub fn writes(&self) -> Vec<(K, V)> {
        self.writes.lock().clone()
    }

    /// Recorded deletes, in order.
    pub fn deletes(&self) -> Vec<K> {
        self.deletes.lock().clone()
    }

    /// Count of releases.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Relaxed)
    }

    fn check(&self, key: &K) -> anyhow::Result<()> {
        let rendered = format!("{key:?}");
        match &self.fail_on {
            Some(target) if rendered.trim_matches('"') == target => Err(InjectedError(target.clone()).into()),
            _ => Ok(()),
        }
    }
}

impl<K, V> Customization for RecordingWriter<K, V>
where
    K: Key,
    V: Value,
{
    fn as_releasable(&self) -> Option<&dyn Releasable> {
        Some(self)
    }
}

impl<K, V> Releasable for RecordingWriter<K, V>
where
    K: Key,
    V: Value,
{
    fn release(&self) -> anyhow::Result<()> {
        self.releases.fetch_add(1, Ordering::Relaxed);
        if self.fail_release {
            return Err(InjectedError("release".to_string()).into());
        }
        Ok(())
    }
}

impl<K, V> CacheWriter<K, V> for RecordingWriter<K, V>
where
    K: Key,
    V: Value,
{
    fn write(&self, key: &K, value: &V) -> anyhow::Result<()> {
        self.check(key)?;
        self.writes.lock().push((key.clone(), value.clone()));
        Ok(())
    }

    fn delete(&self, key: &K) -> anyhow::Result<()> {
        self.check(key)?;
        self.deletes.lock().push(key.clone());
        Ok(())
    }
}
