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

//! Cache manager and cache lifecycle notifications.

use std::{fmt::Debug, sync::Arc};

use pantry_common::error::{Error, Result};
use parking_lot::RwLock;

use crate::{config::CacheConfig, status::CacheInfo};

/// Name of the default cache manager.
pub const DEFAULT_MANAGER_NAME: &str = "default";

/// Type-erased view of a cache, handed to lifecycle listeners and management views.
pub trait ManagedCache: Send + Sync + 'static {
    /// Name of the cache.
    fn name(&self) -> &str;

    /// The owning cache manager.
    fn manager(&self) -> &CacheManager;

    /// Qualified name of the cache, see [`name_qualifier`].
    fn qualifier(&self) -> String {
        name_qualifier(self.name(), self.manager())
    }

    /// Collect the statistics view of the cache.
    ///
    /// Fails with [`ErrorKind::Closed`](pantry_common::error::ErrorKind::Closed) once the cache is closed.
    fn info(&self) -> Result<CacheInfo>;

    /// Configuration the cache was built with.
    fn config(&self) -> &CacheConfig;

    /// Whether the cache is closed.
    fn is_closed(&self) -> bool;
}

/// Sink of cache lifecycle notifications.
///
/// `cache_destroyed` is called for every closed cache, including caches nothing was registered for.
pub trait CacheLifecycleListener: Send + Sync + 'static {
    /// Called after a cache is built.
    fn cache_created(&self, _cache: &Arc<dyn ManagedCache>) -> Result<()> {
        Ok(())
    }

    /// Called while a cache is closed.
    fn cache_destroyed(&self, _cache: &Arc<dyn ManagedCache>) -> Result<()> {
        Ok(())
    }
}

struct CacheManagerInner {
    name: String,
    listeners: RwLock<Vec<Arc<dyn CacheLifecycleListener>>>,
}

/// Owner of caches, passed to customization suppliers and notified of cache lifecycle transitions.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<CacheManagerInner>,
}

impl Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("name", &self.inner.name)
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(DEFAULT_MANAGER_NAME)
    }
}

impl CacheManager {
    /// Create a cache manager named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CacheManagerInner {
                name: name.into(),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Name of the manager.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether this is the default manager.
    pub fn is_default(&self) -> bool {
        self.inner.name == DEFAULT_MANAGER_NAME
    }

    /// Add a lifecycle listener, notified of caches created after the call.
    pub fn add_listener(&self, listener: Arc<dyn CacheLifecycleListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// Notify all listeners of a created cache.
    pub fn notify_created(&self, cache: &Arc<dyn ManagedCache>) -> Result<()> {
        self.notify(|listener| listener.cache_created(cache))
    }

    /// Notify all listeners of a destroyed cache.
    ///
    /// Every listener is notified even if some fail, the failures are reported together.
    pub fn notify_destroyed(&self, cache: &Arc<dyn ManagedCache>) -> Result<()> {
        self.notify(|listener| listener.cache_destroyed(cache))
    }

    fn notify<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&dyn CacheLifecycleListener) -> Result<()>,
    {
        let listeners = self.inner.listeners.read().clone();
        let errs = listeners
            .iter()
            .filter_map(|listener| f(listener.as_ref()).err())
            .collect::<Vec<_>>();
        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::multiple(errs))
        }
    }
}

/// Render the qualified name of a cache, e.g. `'orders'` or `'orders', manager='billing'`.
///
/// The manager is only named if it is not the default one.
pub fn name_qualifier(name: &str, manager: &CacheManager) -> String {
    if manager.is_default() {
        format!("'{name}'")
    } else {
        format!("'{name}', manager='{}'", manager.name())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pantry_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_name_qualifier() {
        assert_eq!(name_qualifier("orders", &CacheManager::default()), "'orders'");
        assert_eq!(
            name_qualifier("orders", &CacheManager::new("billing")),
            "'orders', manager='billing'"
        );
    }

    struct Counting {
        created: AtomicUsize,
        destroyed: AtomicUsize,
        fail: bool,
    }

    impl CacheLifecycleListener for Counting {
        fn cache_created(&self, _: &Arc<dyn ManagedCache>) -> Result<()> {
            self.created.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn cache_destroyed(&self, cache: &Arc<dyn ManagedCache>) -> Result<()> {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(Error::new(ErrorKind::Usage, "listener failed").with_context("cache", cache.name()));
            }
            Ok(())
        }
    }

    struct Dummy {
        manager: CacheManager,
        config: CacheConfig,
    }

    impl ManagedCache for Dummy {
        fn name(&self) -> &str {
            &self.config.name
        }

        fn manager(&self) -> &CacheManager {
            &self.manager
        }

        fn info(&self) -> Result<CacheInfo> {
            Err(Error::closed(self.qualifier()))
        }

        fn config(&self) -> &CacheConfig {
            &self.config
        }

        fn is_closed(&self) -> bool {
            true
        }
    }

    #[test_log::test]
    fn test_every_listener_is_notified() {
        let manager = CacheManager::new("m");
        let listeners = (0..3)
            .map(|i| {
                Arc::new(Counting {
                    created: AtomicUsize::new(0),
                    destroyed: AtomicUsize::new(0),
                    fail: i != 1,
                })
            })
            .collect::<Vec<_>>();
        for listener in listeners.iter() {
            manager.add_listener(listener.clone());
        }

        let cache: Arc<dyn ManagedCache> = Arc::new(Dummy {
            manager: manager.clone(),
            config: CacheConfig::new("c"),
        });
        manager.notify_created(&cache).unwrap();
        let err = manager.notify_destroyed(&cache).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Multiple);
        assert_eq!(err.errors().unwrap().len(), 2);
        for listener in listeners.iter() {
            assert_eq!(listener.created.load(Ordering::Relaxed), 1);
            assert_eq!(listener.destroyed.load(Ordering::Relaxed), 1);
        }
    }
}
