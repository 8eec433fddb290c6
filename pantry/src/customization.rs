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

//! Lifecycle of user-supplied pluggable components.
//!
//! A customization is produced by a [`CustomizationSupplier`] when first needed, owned by its cache, and released
//! once when the cache is closed, if it exposes [`Releasable`].

use std::{fmt::Debug, mem, sync::Arc, time::Duration};

use pantry_common::{
    code::{Key, Value},
    error::{Error, ErrorKind, Result},
};
use parking_lot::Mutex;

use crate::manager::CacheManager;

/// A customization holding resources that must be released when its cache is closed.
pub trait Releasable {
    /// Release the held resources.
    fn release(&self) -> anyhow::Result<()>;
}

/// Base trait of all customizations.
pub trait Customization: Send + Sync + 'static {
    /// The release capability of the customization, if it has one.
    fn as_releasable(&self) -> Option<&dyn Releasable> {
        None
    }
}

/// Factory of a customization, invoked with the owning cache manager.
pub trait CustomizationSupplier<T: ?Sized>: Send + Sync + 'static {
    /// Produce the customization.
    fn supply(&self, manager: &CacheManager) -> anyhow::Result<Arc<T>>;
}

impl<T, F> CustomizationSupplier<T> for F
where
    T: ?Sized,
    F: Fn(&CacheManager) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
{
    fn supply(&self, manager: &CacheManager) -> anyhow::Result<Arc<T>> {
        self(manager)
    }
}

/// Supplier that hands out an already built customization.
pub fn instance<T>(customization: Arc<T>) -> impl CustomizationSupplier<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    move |_: &CacheManager| -> anyhow::Result<Arc<T>> { Ok(customization.clone()) }
}

/// Create a customization with `supplier`.
///
/// Returns `None` without side effects if there is no supplier. A supplier failure is wrapped as an
/// [`ErrorKind::Customization`] error whose source is the supplier's error.
pub fn create_customization<T>(
    supplier: Option<&dyn CustomizationSupplier<T>>,
    manager: &CacheManager,
) -> Result<Option<Arc<T>>>
where
    T: ?Sized + 'static,
{
    let Some(supplier) = supplier else {
        return Ok(None);
    };
    supplier.supply(manager).map(Some).map_err(|e| {
        Error::new(ErrorKind::Customization, "initialization of customization failed").with_source(e)
    })
}

/// Release `customization` if it is [`Releasable`], leave it alone otherwise.
///
/// A release failure is wrapped as an [`ErrorKind::Customization`] error naming the customization and the cache.
pub fn close_customization<T>(customization: &T, name: &str, qualifier: &str) -> Result<()>
where
    T: ?Sized + Customization,
{
    let Some(releasable) = customization.as_releasable() else {
        return Ok(());
    };
    releasable.release().map_err(|e| {
        Error::new(ErrorKind::Customization, format!("{name}.close() exception ({qualifier})"))
            .with_context("customization", name)
            .with_source(e)
    })
}

enum HandleState<T: ?Sized> {
    Uncreated,
    Created(Option<Arc<T>>),
    Released,
}

/// A customization slot of a cache: the supplier and, once created, the customization it produced.
pub struct CustomizationHandle<T>
where
    T: ?Sized + Customization,
{
    name: &'static str,
    supplier: Option<Arc<dyn CustomizationSupplier<T>>>,
    state: Mutex<HandleState<T>>,
}

impl<T> Debug for CustomizationHandle<T>
where
    T: ?Sized + Customization,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.lock() {
            HandleState::Uncreated => "uncreated",
            HandleState::Created(Some(_)) => "created",
            HandleState::Created(None) => "absent",
            HandleState::Released => "released",
        };
        f.debug_struct("CustomizationHandle")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}

impl<T> CustomizationHandle<T>
where
    T: ?Sized + Customization,
{
    /// Create a handle named `name` over an optional supplier.
    pub fn new(name: &'static str, supplier: Option<Arc<dyn CustomizationSupplier<T>>>) -> Self {
        Self {
            name,
            supplier,
            state: Mutex::new(HandleState::Uncreated),
        }
    }

    /// Name of the customization.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a supplier is configured.
    pub fn is_configured(&self) -> bool {
        self.supplier.is_some()
    }

    /// The customization, created on first call.
    ///
    /// The supplier runs without the handle locked, so it may use the owning cache. When callers race on the first
    /// call, the first installed customization is kept and the others are released. A failed creation is not
    /// remembered, the next call asks the supplier again.
    pub fn get(&self, manager: &CacheManager) -> Result<Option<Arc<T>>> {
        let Some(supplier) = self.supplier.as_deref() else {
            return Ok(None);
        };
        match &*self.state.lock() {
            HandleState::Created(customization) => return Ok(customization.clone()),
            HandleState::Released => return Err(self.released()),
            HandleState::Uncreated => {}
        }

        let customization = create_customization(Some(supplier), manager)?;

        let mut state = self.state.lock();
        let installed = match &*state {
            HandleState::Uncreated => {
                tracing::trace!("[customization]: {} created", self.name);
                *state = HandleState::Created(customization.clone());
                return Ok(customization);
            }
            HandleState::Created(installed) => Ok(installed.clone()),
            HandleState::Released => Err(self.released()),
        };
        drop(state);
        self.discard(customization);
        installed
    }

    fn released(&self) -> Error {
        Error::new(ErrorKind::Closed, "customization has been released").with_context("customization", self.name)
    }

    /// Release a customization that lost the race to be installed.
    fn discard(&self, customization: Option<Arc<T>>) {
        let Some(releasable) = customization.as_deref().and_then(|c| c.as_releasable()) else {
            return;
        };
        if let Err(e) = releasable.release() {
            tracing::warn!("[customization]: release of surplus {} failed: {e}", self.name);
        }
    }

    /// Release the customization, if it has been created. Later calls do nothing.
    pub fn close(&self, qualifier: &str) -> Result<()> {
        let state = mem::replace(&mut *self.state.lock(), HandleState::Released);
        match state {
            HandleState::Created(Some(customization)) => close_customization(&*customization, self.name, qualifier),
            HandleState::Uncreated | HandleState::Created(None) | HandleState::Released => Ok(()),
        }
    }
}

/// Computes the expiry time of written entries.
pub trait ExpiryPolicy<K, V>: Customization {
    /// Absolute expiry time in milliseconds for `value` written to `key` at `now`, `None` for no expiry.
    fn expire_at(&self, key: &K, value: &V, now: u64) -> Option<u64>;
}

/// Expire entries a fixed duration after they were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpireAfterWrite(pub Duration);

impl Customization for ExpireAfterWrite {}

impl<K, V> ExpiryPolicy<K, V> for ExpireAfterWrite
where
    K: Key,
    V: Value,
{
    fn expire_at(&self, _: &K, _: &V, now: u64) -> Option<u64> {
        let ttl = u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX);
        Some(now.saturating_add(ttl))
    }
}

/// Write-through sink of cache mutations.
///
/// Called while the entry is locked, a failure aborts the mutation.
pub trait CacheWriter<K, V>: Customization {
    /// `value` has been written to `key`.
    fn write(&self, key: &K, value: &V) -> anyhow::Result<()>;

    /// `key` has been removed.
    fn delete(&self, key: &K) -> anyhow::Result<()>;
}
