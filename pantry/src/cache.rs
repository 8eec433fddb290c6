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

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use hashbrown::HashMap;
use pantry_common::{
    action::Pending,
    code::{Key, Value},
    entry::{now_millis, Change, MutableEntry},
    error::{Error, ErrorKind, Result},
    operation::{
        Contains, EntryProcessor, Expire, Get, GetAndPut, GetAndRemove, Invoke, OperationKind, Put, PutIfAbsent,
        Remove, RemoveIfEquals, Replace, ReplaceIfEquals, Semantic,
    },
    store::EntryStore,
};
use pantry_memory::HeapStore;

use crate::{
    batch::EntryProcessingResult,
    config::CacheConfig,
    customization::{CacheWriter, CustomizationHandle, ExpiryPolicy},
    dispatch::Dispatcher,
    manager::{CacheManager, ManagedCache},
    statistics::Statistics,
    status::CacheInfo,
    storage::StorageAdapter,
    view::{Entries, Keys},
};

pub(crate) struct CacheInner<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    pub(crate) config: CacheConfig,
    pub(crate) manager: CacheManager,
    pub(crate) dispatcher: Dispatcher<K, V, S>,
    pub(crate) storage: Option<Arc<dyn StorageAdapter>>,
    pub(crate) expiry_policy: CustomizationHandle<dyn ExpiryPolicy<K, V>>,
    pub(crate) writer: CustomizationHandle<dyn CacheWriter<K, V>>,
    pub(crate) statistics: Arc<Statistics>,
    pub(crate) closed: AtomicBool,
}

impl<K, V, S> CacheInner<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::closed(self.qualifier()));
        }
        Ok(())
    }

    fn record(&self, f: impl FnOnce(&Statistics)) {
        if self.config.statistics {
            f(&self.statistics)
        }
    }
}

impl<K, V, S> ManagedCache for CacheInner<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    fn manager(&self) -> &CacheManager {
        &self.manager
    }

    fn info(&self) -> Result<CacheInfo> {
        self.ensure_open()?;
        Ok(CacheInfo {
            name: self.config.name.clone(),
            manager: self.manager.name().to_string(),
            qualifier: self.qualifier(),
            size: self.dispatcher.store().len(),
            storage: self.storage.as_ref().map(|storage| storage.name().to_string()),
            statistics: self.statistics.snapshot(),
        })
    }

    fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Forward the recorded value change of `entry` to `writer`.
fn write_through<K, V>(writer: &dyn CacheWriter<K, V>, entry: &MutableEntry<K, V>) -> anyhow::Result<()>
where
    K: Key,
    V: Value,
{
    match entry.change() {
        Some(Change::Put(value)) => writer.write(entry.key(), value),
        Some(Change::Remove) => writer.delete(entry.key()),
        None => Ok(()),
    }
}

/// Runs an operation and forwards its effect to the cache writer before it is committed.
struct Through<K, V, O> {
    op: O,
    writer: Arc<dyn CacheWriter<K, V>>,
}

impl<K, V, O> Semantic<K, V> for Through<K, V, O>
where
    K: Key,
    V: Value,
    O: Semantic<K, V>,
{
    type Output = O::Output;

    fn kind(&self) -> OperationKind {
        self.op.kind()
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        let output = self.op.apply(entry)?;
        write_through(self.writer.as_ref(), entry).map_err(|e| {
            Error::new(ErrorKind::External, "cache writer failed")
                .with_context("key", format!("{:?}", entry.key()))
                .with_source(e)
        })?;
        Ok(output)
    }
}

/// Entry processor that forwards the effect of the wrapped processor to the cache writer and counts the
/// invocation once its outcome is known.
struct Invocation<P, K, V> {
    processor: P,
    writer: Option<Arc<dyn CacheWriter<K, V>>>,
    statistics: Option<Arc<Statistics>>,
}

impl<P, K, V> Invocation<P, K, V>
where
    K: Key,
    V: Value,
{
    fn run<R>(&self, entry: &mut MutableEntry<K, V>) -> anyhow::Result<Option<R>>
    where
        P: EntryProcessor<K, V, R>,
    {
        let output = self.processor.process(entry)?;
        if let Some(writer) = &self.writer {
            write_through(writer.as_ref(), entry)?;
        }
        Ok(output)
    }
}

impl<P, K, V, R> EntryProcessor<K, V, R> for Invocation<P, K, V>
where
    K: Key,
    V: Value,
    P: EntryProcessor<K, V, R>,
{
    fn process(&self, entry: &mut MutableEntry<K, V>) -> anyhow::Result<Option<R>> {
        let res = self.run(entry);
        if let Some(statistics) = &self.statistics {
            statistics.record_invocation(res.is_ok());
        }
        res
    }
}

/// In-process cache.
///
/// Every single-key operation is turned into a unit of work on the entry store and executed on the calling thread.
/// Operations on a closed cache fail with [`ErrorKind::Closed`].
pub struct Cache<K, V, S = HeapStore<K, V>>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    inner: Arc<CacheInner<K, V, S>>,
}

impl<K, V, S> Clone for Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V, S> Debug for Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.config.name)
            .field("manager", &self.inner.manager.name())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    pub(crate) fn open(inner: CacheInner<K, V, S>) -> Result<Self> {
        let inner = Arc::new(inner);
        let managed: Arc<dyn ManagedCache> = inner.clone();
        if let Err(e) = inner.manager.notify_created(&managed) {
            inner.closed.store(true, Ordering::Release);
            if let Err(cleanup) = inner.manager.notify_destroyed(&managed) {
                tracing::warn!("[pantry]: cleanup of cache {} failed: {cleanup}", managed.qualifier());
            }
            return Err(e);
        }
        tracing::debug!("[pantry]: cache {} created", managed.qualifier());
        Ok(Self { inner })
    }

    /// Name of the cache.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The owning cache manager.
    pub fn manager(&self) -> &CacheManager {
        &self.inner.manager
    }

    /// Configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Qualified name of the cache, e.g. `'orders'`.
    pub fn qualifier(&self) -> String {
        self.inner.qualifier()
    }

    /// The single-operation executor of the cache.
    pub fn dispatcher(&self) -> &Dispatcher<K, V, S> {
        &self.inner.dispatcher
    }

    /// The secondary storage tier, `None` for a heap-only cache.
    pub fn storage(&self) -> Option<&Arc<dyn StorageAdapter>> {
        self.inner.storage.as_ref()
    }

    /// Whether the cache is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Type-erased view of the cache.
    pub fn managed(&self) -> Arc<dyn ManagedCache> {
        self.inner.clone()
    }

    fn expiry(&self, key: &K, value: &V) -> Result<Option<u64>> {
        let policy = self.inner.expiry_policy.get(&self.inner.manager)?;
        Ok(policy.and_then(|policy| policy.expire_at(key, value, now_millis())))
    }

    fn writer(&self) -> Result<Option<Arc<dyn CacheWriter<K, V>>>> {
        self.inner.writer.get(&self.inner.manager)
    }

    fn invocation<P>(&self, processor: P) -> Result<Arc<Invocation<P, K, V>>> {
        Ok(Arc::new(Invocation {
            processor,
            writer: self.writer()?,
            statistics: self.inner.config.statistics.then(|| self.inner.statistics.clone()),
        }))
    }

    pub(crate) fn has_writer(&self) -> bool {
        self.inner.writer.is_configured()
    }

    fn read<O>(&self, key: K, op: O) -> Result<O::Output>
    where
        O: Semantic<K, V>,
    {
        self.inner.ensure_open()?;
        self.inner.dispatcher.execute(key, op)
    }

    fn mutate<O>(&self, key: K, op: O) -> Result<O::Output>
    where
        O: Semantic<K, V>,
    {
        self.inner.ensure_open()?;
        match self.writer()? {
            Some(writer) => self.inner.dispatcher.execute(key, Through { op, writer }),
            None => self.inner.dispatcher.execute(key, op),
        }
    }

    /// Get the value of `key`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let value = self.read(key.clone(), Get)?;
        self.inner.record(|s| s.record_get(value.is_some()));
        Ok(value)
    }

    /// Whether `key` has a value.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.read(key.clone(), Contains)
    }

    /// Set the value of `key`.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let expire_at = self.expiry(&key, &value)?;
        self.mutate(key, Put::with_expiry(value, expire_at))?;
        self.inner.record(Statistics::record_put);
        Ok(())
    }

    /// Set the value of `key`, return the previous value.
    pub fn get_and_put(&self, key: K, value: V) -> Result<Option<V>> {
        let expire_at = self.expiry(&key, &value)?;
        let old = self.mutate(key, GetAndPut::new(value, expire_at))?;
        self.inner.record(Statistics::record_put);
        Ok(old)
    }

    pub(crate) fn put_if_absent_get(&self, key: K, value: V) -> Result<Option<V>> {
        let expire_at = self.expiry(&key, &value)?;
        let present = self.mutate(key, PutIfAbsent::new(value, expire_at))?;
        if present.is_none() {
            self.inner.record(Statistics::record_put);
        }
        Ok(present)
    }

    /// Set the value of `key` if it has none. Returns whether the value was set.
    pub fn put_if_absent(&self, key: K, value: V) -> Result<bool> {
        self.put_if_absent_get(key, value).map(|present| present.is_none())
    }

    pub(crate) fn replace_get(&self, key: K, value: V) -> Result<Option<V>> {
        let expire_at = self.expiry(&key, &value)?;
        let old = self.mutate(key, Replace::new(value, expire_at))?;
        if old.is_some() {
            self.inner.record(Statistics::record_put);
        }
        Ok(old)
    }

    /// Overwrite the value of `key` if it has one. Returns whether the value was replaced.
    pub fn replace(&self, key: K, value: V) -> Result<bool> {
        self.replace_get(key, value).map(|old| old.is_some())
    }

    /// Overwrite the value of `key` if it equals `expected`. Returns whether the value was replaced.
    pub fn replace_if_equals(&self, key: K, expected: V, value: V) -> Result<bool>
    where
        V: PartialEq,
    {
        let expire_at = self.expiry(&key, &value)?;
        let replaced = self.mutate(key, ReplaceIfEquals::new(expected, value, expire_at))?;
        if replaced {
            self.inner.record(Statistics::record_put);
        }
        Ok(replaced)
    }

    /// Remove `key`. Returns whether it had a value.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let removed = self.mutate(key.clone(), Remove)?;
        if removed {
            self.inner.record(Statistics::record_removal);
        }
        Ok(removed)
    }

    /// Remove `key` if its value equals `expected`. Returns whether it was removed.
    pub fn remove_if_equals(&self, key: &K, expected: V) -> Result<bool>
    where
        V: PartialEq,
    {
        let removed = self.mutate(key.clone(), RemoveIfEquals::new(expected))?;
        if removed {
            self.inner.record(Statistics::record_removal);
        }
        Ok(removed)
    }

    /// Remove `key`, return its value.
    pub fn get_and_remove(&self, key: &K) -> Result<Option<V>> {
        let old = self.mutate(key.clone(), GetAndRemove)?;
        if old.is_some() {
            self.inner.record(Statistics::record_removal);
        }
        Ok(old)
    }

    /// Set the expiry time of `key` in milliseconds since the unix epoch.
    ///
    /// [`NOW`](pantry_common::entry::NOW) or any time already passed removes the entry,
    /// [`ETERNAL`](pantry_common::entry::ETERNAL) makes it never expire. Does nothing if `key` has no value.
    pub fn expire_at(&self, key: &K, at: u64) -> Result<()> {
        self.mutate(key.clone(), Expire::new(at))?;
        self.inner.record(Statistics::record_expiry);
        Ok(())
    }

    /// Apply `processor` to the entry of `key`, return what it produced.
    ///
    /// A processor failure is returned as an [`ErrorKind::EntryProcessing`] error whose source is the processor's
    /// error, the entry is left untouched then.
    pub fn invoke<P, R>(&self, key: K, processor: P) -> Result<Option<R>>
    where
        P: EntryProcessor<K, V, R>,
        R: Send + 'static,
    {
        self.inner.ensure_open()?;
        let processor = self.invocation(processor)?;
        self.inner.dispatcher.execute(key, Invoke::<_, R>::new(processor))
    }

    /// Apply `processor` to the entry of every key, in order.
    ///
    /// Failures are recorded per key and never abort the batch, see [`EntryProcessingResult`]. Keys the processor
    /// produced nothing for are left out of the result.
    pub fn invoke_all<I, P, R>(&self, keys: I, processor: P) -> Result<HashMap<K, EntryProcessingResult<R>>>
    where
        I: IntoIterator<Item = K>,
        P: EntryProcessor<K, V, R>,
        R: Send + 'static,
    {
        self.inner.ensure_open()?;
        let processor = self.invocation(processor)?;
        Ok(self.inner.dispatcher.invoke_all(keys, processor))
    }

    /// Apply `processor` to the entry of `key` on the configured spawner or the current tokio runtime.
    pub fn invoke_async<P, R>(&self, key: K, processor: P) -> Result<Pending<Option<R>>>
    where
        P: EntryProcessor<K, V, R>,
        R: Send + 'static,
    {
        self.inner.ensure_open()?;
        let processor = self.invocation(processor)?;
        self.inner.dispatcher.execute_async(key, Invoke::<_, R>::new(processor))
    }

    /// Key view of the cache.
    pub fn keys(&self) -> Result<Keys<K, V, S>> {
        self.inner.ensure_open()?;
        Ok(Keys::new(self.inner.dispatcher.store()))
    }

    /// Entry view of the cache.
    pub fn entries(&self) -> Result<Entries<K, V, S>> {
        self.inner.ensure_open()?;
        Ok(Entries::new(self.inner.dispatcher.store()))
    }

    /// Remove every key produced by the key view.
    ///
    /// Keys are removed one by one, the first failure is returned and stops the removal.
    pub fn remove_all(&self) -> Result<()> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Remove `keys` one by one.
    ///
    /// The first failure is returned and stops the removal: keys before the failing one stay removed, keys after it
    /// are not removed.
    pub fn remove_all_keys<I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
    {
        for key in keys {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Drop all entries. The cache writer is not called.
    pub fn clear(&self) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner.dispatcher.store().clear();
        Ok(())
    }

    /// Count of stored entries.
    pub fn len(&self) -> usize {
        self.inner.dispatcher.store().len()
    }

    /// Whether the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.inner.dispatcher.store().is_empty()
    }

    /// Collect the statistics view of the cache.
    pub fn info(&self) -> Result<CacheInfo> {
        self.inner.info()
    }

    /// Close the cache.
    ///
    /// Releases every customization, drops all entries and notifies the manager's lifecycle listeners. All steps are
    /// attempted, failures are returned together. Closing a closed cache does nothing.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let qualifier = self.inner.qualifier();

        let mut errs = vec![];
        errs.extend(self.inner.expiry_policy.close(&qualifier).err());
        errs.extend(self.inner.writer.close(&qualifier).err());
        self.inner.dispatcher.store().clear();
        errs.extend(self.inner.manager.notify_destroyed(&self.managed()).err());

        if errs.is_empty() {
            tracing::debug!("[pantry]: cache {qualifier} closed");
            return Ok(());
        }
        let err = Error::multiple(errs);
        tracing::warn!("[pantry]: cache {qualifier} closed with failures: {err}");
        Err(err)
    }

    /// Drop all entries and close the cache.
    pub fn clear_and_close(&self) -> Result<()> {
        if let Err(e) = self.clear() {
            if e.kind() != ErrorKind::Closed {
                return Err(e);
            }
        }
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Duration};

    use pantry_common::entry::{ETERNAL, NOW};

    use super::*;
    use crate::{
        config::CacheBuilder,
        customization::{instance, ExpireAfterWrite},
        manager::CacheLifecycleListener,
        test_utils::{InjectedError, RecordingWriter},
    };

    fn cache() -> Cache<String, u64> {
        CacheBuilder::new("orders").build().unwrap()
    }

    #[test_log::test]
    fn test_single_key_operations() {
        let cache = cache();
        let k = || "k".to_string();

        assert_eq!(cache.get(&k()).unwrap(), None);
        assert!(!cache.replace(k(), 1).unwrap());
        assert!(cache.put_if_absent(k(), 1).unwrap());
        assert!(!cache.put_if_absent(k(), 2).unwrap());
        assert_eq!(cache.get(&k()).unwrap(), Some(1));
        assert!(cache.contains_key(&k()).unwrap());

        assert!(cache.replace(k(), 3).unwrap());
        assert!(!cache.replace_if_equals(k(), 1, 4).unwrap());
        assert!(cache.replace_if_equals(k(), 3, 4).unwrap());
        assert_eq!(cache.get_and_put(k(), 5).unwrap(), Some(4));

        assert!(!cache.remove_if_equals(&k(), 4).unwrap());
        assert_eq!(cache.get_and_remove(&k()).unwrap(), Some(5));
        assert!(!cache.remove(&k()).unwrap());
        assert!(cache.is_empty());

        let info = cache.info().unwrap();
        assert_eq!(info.statistics.gets, 2);
        assert_eq!(info.statistics.hits, 1);
        assert_eq!(info.statistics.removals, 1);
    }

    #[test_log::test]
    fn test_expire_at() {
        let cache = cache();
        cache.put("a".to_string(), 1).unwrap();
        cache.put("b".to_string(), 2).unwrap();

        cache.expire_at(&"a".to_string(), NOW).unwrap();
        assert_eq!(cache.get(&"a".to_string()).unwrap(), None);

        cache.expire_at(&"b".to_string(), now_millis() + 60_000).unwrap();
        assert_eq!(cache.get(&"b".to_string()).unwrap(), Some(2));
        cache.expire_at(&"b".to_string(), ETERNAL).unwrap();
        assert_eq!(cache.entries().unwrap().next().unwrap().expire_at(), None);

        cache.expire_at(&"missing".to_string(), NOW).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test_log::test]
    fn test_expiry_policy_applies_on_write() {
        let cache: Cache<String, u64> = CacheBuilder::new("orders")
            .with_expiry_policy(instance::<dyn ExpiryPolicy<String, u64>>(Arc::new(ExpireAfterWrite(
                Duration::from_secs(60),
            ))))
            .build()
            .unwrap();
        let before = now_millis();
        cache.put("a".to_string(), 1).unwrap();

        let entry = cache.entries().unwrap().next().unwrap();
        let at = entry.expire_at().unwrap();
        assert!(at >= before + 60_000);
    }

    #[test_log::test]
    fn test_invoke_failure_leaves_entry_untouched() {
        let cache = cache();
        cache.put("a".to_string(), 1).unwrap();

        let processor = |e: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> {
            e.set_value(100);
            anyhow::bail!("rejected")
        };
        let err = cache.invoke::<_, u64>("a".to_string(), processor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryProcessing);
        assert_eq!(err.source().unwrap().to_string(), "rejected");
        assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(1));

        let info = cache.info().unwrap();
        assert_eq!(info.statistics.invocations, 1);
        assert_eq!(info.statistics.invocation_failures, 1);
    }

    #[test_log::test]
    fn test_writer_sees_committed_changes() {
        let writer = Arc::new(RecordingWriter::<String, u64>::default());
        let cache: Cache<String, u64> = CacheBuilder::new("orders")
            .with_writer(instance::<dyn CacheWriter<String, u64>>(writer.clone()))
            .build()
            .unwrap();

        cache.put("a".to_string(), 1).unwrap();
        cache.put_if_absent("a".to_string(), 2).unwrap();
        cache.remove(&"a".to_string()).unwrap();
        cache.remove(&"a".to_string()).unwrap();
        cache
            .invoke::<_, ()>("b".to_string(), |e: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<()>> {
                e.set_value(7);
                Ok(None)
            })
            .unwrap();

        assert_eq!(writer.writes(), vec![("a".to_string(), 1), ("b".to_string(), 7)]);
        assert_eq!(writer.deletes(), vec!["a".to_string()]);
    }

    #[test_log::test]
    fn test_failing_writer_aborts_mutation() {
        let writer = Arc::new(RecordingWriter::<String, u64>::default().fail_on("a"));
        let cache: Cache<String, u64> = CacheBuilder::new("orders")
            .with_writer(instance::<dyn CacheWriter<String, u64>>(writer.clone()))
            .build()
            .unwrap();

        let err = cache.put("a".to_string(), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::External);
        assert_eq!(cache.get(&"a".to_string()).unwrap(), None);
    }

    #[test_log::test]
    fn test_operations_on_closed_cache() {
        let cache = cache();
        cache.put("a".to_string(), 1).unwrap();
        cache.close().unwrap();
        cache.close().unwrap();

        assert!(cache.is_closed());
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a".to_string()).unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(cache.put("a".to_string(), 1).unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(cache.keys().unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(cache.info().unwrap_err().kind(), ErrorKind::Closed);
        cache.clear_and_close().unwrap();
    }

    #[test_log::test]
    fn test_close_creates_nothing() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let supplier = move |_: &CacheManager| -> anyhow::Result<Arc<dyn CacheWriter<String, u64>>> {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(RecordingWriter::<String, u64>::default()))
        };
        let cache: Cache<String, u64> = CacheBuilder::new("orders").with_writer(supplier).build().unwrap();
        cache.close().unwrap();
        assert_eq!(created.load(Ordering::Relaxed), 0);
    }

    #[test_log::test]
    fn test_invocation_statistics_count_every_attempt() {
        let cache = cache();
        cache.put("a".to_string(), 1).unwrap();
        let reject_b = |e: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> {
            anyhow::ensure!(e.key() != "b", "rejected");
            Ok(e.value().copied())
        };

        let results = cache
            .invoke_all(["b", "a", "b"].map(String::from), reject_b)
            .unwrap();
        assert_eq!(results.len(), 2);

        let info = cache.info().unwrap();
        assert_eq!(info.statistics.invocations, 3);
        assert_eq!(info.statistics.invocation_failures, 2);
    }

    #[test_log::test]
    fn test_writer_failure_counts_as_failed_invocation() {
        let writer = Arc::new(RecordingWriter::<String, u64>::default().fail_on("a"));
        let cache: Cache<String, u64> = CacheBuilder::new("orders")
            .with_writer(instance::<dyn CacheWriter<String, u64>>(writer.clone()))
            .build()
            .unwrap();

        let err = cache
            .invoke::<_, u64>("a".to_string(), |e: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> {
                e.set_value(1);
                Ok(Some(1))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryProcessing);
        assert_eq!(err.downcast_ref::<InjectedError>(), Some(&InjectedError("a".to_string())));
        assert_eq!(cache.info().unwrap().statistics.invocation_failures, 1);
        assert!(cache.is_empty());
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_async_invocation_statistics() {
        let cache = cache();
        let reject = |_: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> { anyhow::bail!("rejected") };

        let pending = cache.invoke_async::<_, u64>("a".to_string(), reject).unwrap();
        assert_eq!(pending.await.unwrap_err().kind(), ErrorKind::EntryProcessing);

        let info = cache.info().unwrap();
        assert_eq!(info.statistics.invocations, 1);
        assert_eq!(info.statistics.invocation_failures, 1);
    }

    #[test_log::test]
    fn test_statistics_disabled() {
        let cache: Cache<String, u64> = CacheBuilder::new("orders").with_statistics(false).build().unwrap();
        cache
            .invoke::<_, u64>("a".to_string(), |e: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> {
                Ok(e.value().copied())
            })
            .unwrap();
        assert_eq!(cache.info().unwrap().statistics.invocations, 0);
    }

    struct FailingListener;

    impl CacheLifecycleListener for FailingListener {
        fn cache_destroyed(&self, _: &Arc<dyn ManagedCache>) -> Result<()> {
            Err(Error::new(ErrorKind::External, "listener failed").with_source(InjectedError("destroyed".to_string())))
        }
    }

    #[test_log::test]
    fn test_close_attempts_every_step() {
        let writer = Arc::new(RecordingWriter::<String, u64>::default().fail_release());
        let manager = CacheManager::new("billing");
        manager.add_listener(Arc::new(FailingListener));
        let cache: Cache<String, u64> = CacheBuilder::new("orders")
            .with_manager(manager)
            .with_writer(instance::<dyn CacheWriter<String, u64>>(writer.clone()))
            .build()
            .unwrap();
        cache.put("a".to_string(), 1).unwrap();

        let err = cache.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Multiple);
        let errs = err.errors().unwrap();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].kind(), ErrorKind::Customization);
        assert_eq!(errs[0].message(), "writer.close() exception ('orders', manager='billing')");
        assert_eq!(errs[0].downcast_ref::<InjectedError>(), Some(&InjectedError("release".to_string())));
        assert_eq!(errs[1].downcast_ref::<InjectedError>(), Some(&InjectedError("destroyed".to_string())));

        assert_eq!(writer.releases(), 1);
        assert!(cache.is_closed());
        assert!(cache.is_empty());
    }

    #[test_log::test]
    fn test_concurrent_close_releases_once() {
        let writer = Arc::new(RecordingWriter::<String, u64>::default());
        let cache: Cache<String, u64> = CacheBuilder::new("orders")
            .with_writer(instance::<dyn CacheWriter<String, u64>>(writer.clone()))
            .build()
            .unwrap();
        cache.put("a".to_string(), 1).unwrap();

        std::thread::scope(|s| {
            for _ in 0..8 {
                let cache = cache.clone();
                s.spawn(move || cache.close().unwrap());
            }
        });

        assert_eq!(writer.releases(), 1);
        assert!(cache.is_closed());
        assert_eq!(cache.put("b".to_string(), 2).unwrap_err().kind(), ErrorKind::Closed);
    }
}
