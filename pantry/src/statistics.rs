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

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Operation counters of a cache.
///
/// Counters are updated with relaxed ordering, a snapshot is not consistent across counters.
#[derive(Debug, Default)]
pub struct Statistics {
    gets: AtomicU64,
    hits: AtomicU64,
    puts: AtomicU64,
    removals: AtomicU64,
    invocations: AtomicU64,
    invocation_failures: AtomicU64,
    expiries: AtomicU64,
}

/// Point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Lookups.
    pub gets: u64,
    /// Lookups that found a value.
    pub hits: u64,
    /// Written values.
    pub puts: u64,
    /// Removed entries.
    pub removals: u64,
    /// Entry processor invocations.
    pub invocations: u64,
    /// Entry processor invocations that failed.
    pub invocation_failures: u64,
    /// Explicit expiry time updates.
    pub expiries: u64,
}

impl StatisticsSnapshot {
    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.gets.saturating_sub(self.hits)
    }
}

impl Statistics {
    pub(crate) fn record_get(&self, hit: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation(&self, ok: bool) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.invocation_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_expiry(&self) {
        self.expiries.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            invocation_failures: self.invocation_failures.load(Ordering::Relaxed),
            expiries: self.expiries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let statistics = Statistics::default();
        statistics.record_get(true);
        statistics.record_get(false);
        statistics.record_get(true);
        statistics.record_put();
        statistics.record_invocation(false);
        statistics.record_invocation(true);

        let snapshot = statistics.snapshot();
        assert_eq!(snapshot.gets, 3);
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses(), 1);
        assert_eq!(snapshot.puts, 1);
        assert_eq!(snapshot.invocations, 2);
        assert_eq!(snapshot.invocation_failures, 1);
        assert_eq!(snapshot.removals, 0);
    }
}
