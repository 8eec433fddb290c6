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

//! Status rendering of a cache.

use std::fmt::Display;

use pantry_common::{
    code::{Key, Value},
    error::ErrorKind,
    store::EntryStore,
};
use serde::{Deserialize, Serialize};

use crate::{cache::Cache, statistics::StatisticsSnapshot};

/// Statistics view of an open cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Name of the cache.
    pub name: String,
    /// Name of the cache manager.
    pub manager: String,
    /// Qualified name, see [`name_qualifier`](crate::manager::name_qualifier).
    pub qualifier: String,
    /// Count of stored entries.
    pub size: usize,
    /// Name of the attached storage tier, if any.
    pub storage: Option<String>,
    /// Operation counters.
    pub statistics: StatisticsSnapshot,
}

impl Display for CacheInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = &self.statistics;
        write!(
            f,
            "Cache(name={}, size={}, gets={}, hits={}, misses={}, puts={}, removals={}, invocations={}, \
             invocation_failures={}, expiries={}",
            self.qualifier,
            self.size,
            s.gets,
            s.hits,
            s.misses(),
            s.puts,
            s.removals,
            s.invocations,
            s.invocation_failures,
            s.expiries
        )?;
        if let Some(storage) = &self.storage {
            write!(f, ", storage={storage}")?;
        }
        write!(f, ")")
    }
}

/// Status line of a closed cache.
pub fn closed_status(qualifier: &str) -> String {
    format!("Cache(name={qualifier}, closed=true)")
}

/// Renders the statistics view, which is collected on each call.
impl<K, V, S> Display for Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.info() {
            Ok(info) => write!(f, "{info}"),
            Err(e) if e.kind() == ErrorKind::Closed => f.write_str(&closed_status(&self.qualifier())),
            Err(e) => write!(f, "Cache(name={}, error={e})", self.qualifier()),
        }
    }
}
