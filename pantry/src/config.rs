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

//! Cache configuration and builder.

use std::{
    fmt::Debug,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use pantry_common::{
    code::{Key, Value},
    error::{Error, ErrorKind, Result},
    spawn::Spawner,
    store::EntryStore,
};
use pantry_memory::HeapStore;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{Cache, CacheInner},
    customization::{instance, CacheWriter, CustomizationHandle, CustomizationSupplier, ExpireAfterWrite, ExpiryPolicy},
    dispatch::Dispatcher,
    manager::CacheManager,
    statistics::Statistics,
    storage::StorageAdapter,
};

/// Serializable configuration of a cache.
///
/// Missing fields take their default values when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache, unique within its manager.
    pub name: String,
    /// Count of shards of the heap store.
    pub shards: usize,
    /// Expire entries this many milliseconds after they were written, if no expiry policy is given.
    pub expire_after_millis: Option<u64>,
    /// Whether operation counters are recorded.
    pub statistics: bool,
    /// Whether the cache registers its management views on creation.
    pub management: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shards: 8,
            expire_after_millis: None,
            statistics: true,
            management: false,
        }
    }
}

impl CacheConfig {
    /// Default configuration of a cache named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::new(ErrorKind::Config, "cache name must not be empty"));
        }
        if self.shards == 0 {
            return Err(Error::new(ErrorKind::Config, "shards must be greater than 0").with_context("cache", &self.name));
        }
        Ok(())
    }
}

/// Builder of a [`Cache`].
pub struct CacheBuilder<K, V, S = HeapStore<K, V>>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    config: CacheConfig,
    store: S,
    manager: CacheManager,
    storage: Option<Arc<dyn StorageAdapter>>,
    spawner: Option<Spawner>,
    expiry_policy: Option<Arc<dyn CustomizationSupplier<dyn ExpiryPolicy<K, V>>>>,
    writer: Option<Arc<dyn CustomizationSupplier<dyn CacheWriter<K, V>>>>,
}

impl<K, V, S> Debug for CacheBuilder<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .field("storage", &self.storage)
            .finish()
    }
}

impl<K, V> CacheBuilder<K, V, HeapStore<K, V>>
where
    K: Key,
    V: Value,
{
    /// Builder of a heap cache named `name`, owned by the default manager.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(CacheConfig::new(name))
    }

    /// Builder of a heap cache with `config`.
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            store: HeapStore::new(config.shards),
            config,
            manager: CacheManager::default(),
            storage: None,
            spawner: None,
            expiry_policy: None,
            writer: None,
        }
    }

    /// Set the shard count of the heap store.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self.store = HeapStore::new(shards);
        self
    }
}

impl<K, V, S> CacheBuilder<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    /// Set the owning cache manager.
    pub fn with_manager(mut self, manager: CacheManager) -> Self {
        self.manager = manager;
        self
    }

    /// Expire entries `ttl` after they were written, unless an expiry policy is given.
    pub fn with_expire_after(mut self, ttl: Duration) -> Self {
        self.config.expire_after_millis = Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Enable or disable operation counters.
    pub fn with_statistics(mut self, enable: bool) -> Self {
        self.config.statistics = enable;
        self
    }

    /// Enable or disable registration of the management views.
    pub fn with_management(mut self, enable: bool) -> Self {
        self.config.management = enable;
        self
    }

    /// Use `store` as the entry store.
    pub fn with_store<OS>(self, store: OS) -> CacheBuilder<K, V, OS>
    where
        OS: EntryStore<K, V>,
    {
        CacheBuilder {
            config: self.config,
            store,
            manager: self.manager,
            storage: self.storage,
            spawner: self.spawner,
            expiry_policy: self.expiry_policy,
            writer: self.writer,
        }
    }

    /// Attach a secondary storage tier.
    pub fn with_storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Run asynchronous operations on `spawner`.
    pub fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Set the supplier of the expiry policy.
    pub fn with_expiry_policy(mut self, supplier: impl CustomizationSupplier<dyn ExpiryPolicy<K, V>>) -> Self {
        self.expiry_policy = Some(Arc::new(supplier));
        self
    }

    /// Set the supplier of the cache writer.
    pub fn with_writer(mut self, supplier: impl CustomizationSupplier<dyn CacheWriter<K, V>>) -> Self {
        self.writer = Some(Arc::new(supplier));
        self
    }

    /// The configuration so far.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Build the cache and notify the lifecycle listeners of the manager.
    pub fn build(self) -> Result<Cache<K, V, S>> {
        self.config.validate()?;

        let expiry_policy = self.expiry_policy.or_else(|| {
            self.config.expire_after_millis.map(|millis| {
                let policy: Arc<dyn ExpiryPolicy<K, V>> = Arc::new(ExpireAfterWrite(Duration::from_millis(millis)));
                Arc::new(instance(policy)) as Arc<dyn CustomizationSupplier<dyn ExpiryPolicy<K, V>>>
            })
        });

        let dispatcher = match self.spawner {
            Some(spawner) => Dispatcher::new(self.store).with_spawner(spawner),
            None => Dispatcher::new(self.store),
        };

        Cache::open(CacheInner {
            config: self.config,
            manager: self.manager,
            dispatcher,
            storage: self.storage,
            expiry_policy: CustomizationHandle::new("expiryPolicy", expiry_policy),
            writer: CustomizationHandle::new("writer", self.writer),
            statistics: Arc::new(Statistics::default()),
            closed: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config: CacheConfig = serde_json::from_str(r#"{ "name": "orders", "management": true }"#).unwrap();
        assert_eq!(
            config,
            CacheConfig {
                name: "orders".to_string(),
                management: true,
                ..Default::default()
            }
        );

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["shards"], 8);
        assert_eq!(json["statistics"], true);
        assert_eq!(json["expire_after_millis"], serde_json::Value::Null);
    }

    #[test]
    fn test_validate() {
        assert_eq!(CacheConfig::default().validate().unwrap_err().kind(), ErrorKind::Config);
        let config = CacheConfig {
            shards: 0,
            ..CacheConfig::new("orders")
        };
        assert_eq!(config.validate().unwrap_err().context_value("cache"), Some("orders"));
    }

    #[test_log::test]
    fn test_build() {
        let cache: Cache<u64, u64> = CacheBuilder::new("orders")
            .with_shards(2)
            .with_statistics(false)
            .with_expire_after(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(cache.config().shards, 2);
        assert_eq!(cache.config().expire_after_millis, Some(60_000));
        assert!(cache.manager().is_default());

        cache.put(1, 1).unwrap();
        assert!(cache.entries().unwrap().next().unwrap().expire_at().is_some());
        assert_eq!(cache.info().unwrap().statistics.puts, 0);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let err = CacheBuilder::<u64, u64>::new("").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test_log::test]
    fn test_with_store() {
        let store = HeapStore::<u64, u64>::new(1);
        let cache = CacheBuilder::new("orders").with_store(store.clone()).build().unwrap();
        cache.put(1, 10).unwrap();
        assert_eq!(store.len(), 1);
    }
}
