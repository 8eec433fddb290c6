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

//! Management views of caches.
//!
//! [`ManagementSupport`] registers a statistics view and a configuration view of every cache created with
//! management enabled, and unregisters them when the cache is closed. Views are registered on an injected
//! [`ManagementServer`] under names of the form `pantry:type=<view>,CacheManager=<manager>,Cache=<cache>`.

use std::{
    fmt::Debug,
    sync::{Arc, LazyLock, Weak},
};

use hashbrown::HashMap;
use itertools::Itertools;
use pantry_common::error::{Error, ErrorKind, Result};
use parking_lot::RwLock;

use crate::manager::{CacheLifecycleListener, ManagedCache};

/// Domain of the management view names.
pub const DOMAIN: &str = "pantry";

/// Failure of a management server.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// No view is registered under the name.
    #[error("instance not found: {0}")]
    NotFound(String),
    /// A view is already registered under the name.
    #[error("instance already exists: {0}")]
    AlreadyExists(String),
    /// The name is not of the form `domain:key=value[,key=value]*`.
    #[error("malformed object name: {0}")]
    MalformedName(String),
    /// Other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A view exposed on a management server.
pub trait ManagedBean: Send + Sync + 'static {
    /// Current attributes of the view.
    fn attributes(&self) -> Result<serde_json::Value>;
}

/// Registry of management views.
pub trait ManagementServer: Send + Sync + 'static {
    /// Register `bean` under `name`.
    fn register(&self, name: &str, bean: Arc<dyn ManagedBean>) -> std::result::Result<(), RegistrationError>;

    /// Unregister the view registered under `name`.
    fn unregister(&self, name: &str) -> std::result::Result<(), RegistrationError>;
}

/// In-process management server.
#[derive(Default)]
pub struct LocalManagementServer {
    beans: RwLock<HashMap<String, Arc<dyn ManagedBean>>>,
}

impl Debug for LocalManagementServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalManagementServer")
            .field("beans", &self.beans.read().len())
            .finish()
    }
}

static GLOBAL: LazyLock<Arc<LocalManagementServer>> = LazyLock::new(|| Arc::new(LocalManagementServer::new()));

impl LocalManagementServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide server, created on first use and kept for the life of the process.
    pub fn global() -> Arc<LocalManagementServer> {
        GLOBAL.clone()
    }

    /// The view registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ManagedBean>> {
        self.beans.read().get(name).cloned()
    }

    /// Names of all registered views, sorted.
    pub fn names(&self) -> Vec<String> {
        self.beans.read().keys().cloned().sorted().collect()
    }

    fn validate(name: &str) -> std::result::Result<(), RegistrationError> {
        let malformed = || RegistrationError::MalformedName(name.to_string());
        let (domain, properties) = name.split_once(':').ok_or_else(malformed)?;
        if domain.is_empty() || properties.is_empty() || name.contains('\n') {
            return Err(malformed());
        }
        let valid = properties
            .split(',')
            .all(|property| matches!(property.split_once('='), Some((k, v)) if !k.is_empty() && !v.is_empty()));
        if !valid {
            return Err(malformed());
        }
        Ok(())
    }
}

impl ManagementServer for LocalManagementServer {
    fn register(&self, name: &str, bean: Arc<dyn ManagedBean>) -> std::result::Result<(), RegistrationError> {
        Self::validate(name)?;
        let mut beans = self.beans.write();
        if beans.contains_key(name) {
            return Err(RegistrationError::AlreadyExists(name.to_string()));
        }
        beans.insert(name.to_string(), bean);
        Ok(())
    }

    fn unregister(&self, name: &str) -> std::result::Result<(), RegistrationError> {
        match self.beans.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(RegistrationError::NotFound(name.to_string())),
        }
    }
}

/// Replace the characters with a meaning in view names (`:`, `=`, `,` and newline) with `.`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, ':' | '=' | ',' | '\n') { '.' } else { c })
        .collect()
}

fn object_name(kind: &str, cache: &dyn ManagedCache) -> String {
    format!(
        "{DOMAIN}:type={kind},CacheManager={},Cache={}",
        sanitize_name(cache.manager().name()),
        sanitize_name(cache.name())
    )
}

fn upgrade(cache: &Weak<dyn ManagedCache>) -> Result<Arc<dyn ManagedCache>> {
    cache
        .upgrade()
        .ok_or_else(|| Error::new(ErrorKind::Closed, "cache has been dropped"))
}

struct StatisticsBean {
    cache: Weak<dyn ManagedCache>,
}

impl ManagedBean for StatisticsBean {
    fn attributes(&self) -> Result<serde_json::Value> {
        let info = upgrade(&self.cache)?.info()?;
        serde_json::to_value(info)
            .map_err(|e| Error::new(ErrorKind::External, "cannot render the statistics view").with_source(e))
    }
}

struct ConfigurationBean {
    cache: Weak<dyn ManagedCache>,
}

impl ManagedBean for ConfigurationBean {
    fn attributes(&self) -> Result<serde_json::Value> {
        let cache = upgrade(&self.cache)?;
        serde_json::to_value(cache.config())
            .map_err(|e| Error::new(ErrorKind::External, "cannot render the configuration view").with_source(e))
    }
}

/// Registers and unregisters the management views of caches.
#[derive(Clone)]
pub struct ManagementSupport {
    server: Arc<dyn ManagementServer>,
}

impl Debug for ManagementSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementSupport").finish()
    }
}

impl ManagementSupport {
    /// Register views on `server`.
    pub fn new(server: Arc<dyn ManagementServer>) -> Self {
        Self { server }
    }

    /// Register views on the process-wide [`LocalManagementServer`].
    pub fn global() -> Self {
        Self::new(LocalManagementServer::global())
    }

    /// Name of the statistics view of `cache`.
    pub fn statistics_name(cache: &dyn ManagedCache) -> String {
        object_name("CacheStatistics", cache)
    }

    /// Name of the configuration view of `cache`.
    pub fn configuration_name(cache: &dyn ManagedCache) -> String {
        object_name("CacheConfiguration", cache)
    }

    /// Register the statistics view of `cache`.
    pub fn enable_statistics(&self, cache: &Arc<dyn ManagedCache>) -> Result<()> {
        let bean = StatisticsBean {
            cache: Arc::downgrade(cache),
        };
        self.register(Self::statistics_name(cache.as_ref()), Arc::new(bean))
    }

    /// Unregister the statistics view of `cache`. Does nothing if it is not registered.
    pub fn disable_statistics(&self, cache: &dyn ManagedCache) -> Result<()> {
        self.unregister(Self::statistics_name(cache))
    }

    /// Register the configuration view of `cache`.
    pub fn enable_configuration(&self, cache: &Arc<dyn ManagedCache>) -> Result<()> {
        let bean = ConfigurationBean {
            cache: Arc::downgrade(cache),
        };
        self.register(Self::configuration_name(cache.as_ref()), Arc::new(bean))
    }

    /// Unregister the configuration view of `cache`. Does nothing if it is not registered.
    pub fn disable_configuration(&self, cache: &dyn ManagedCache) -> Result<()> {
        self.unregister(Self::configuration_name(cache))
    }

    fn register(&self, name: String, bean: Arc<dyn ManagedBean>) -> Result<()> {
        self.server.register(&name, bean).map_err(|e| {
            Error::new(ErrorKind::Usage, "error registering management view")
                .with_context("name", name)
                .with_source(e)
        })
    }

    fn unregister(&self, name: String) -> Result<()> {
        match self.server.unregister(&name) {
            Ok(()) => Ok(()),
            Err(RegistrationError::NotFound(_)) => {
                tracing::trace!("[management]: {name} is not registered");
                Ok(())
            }
            Err(e) => Err(Error::new(ErrorKind::Usage, "error unregistering management view")
                .with_context("name", name)
                .with_source(e)),
        }
    }
}

impl CacheLifecycleListener for ManagementSupport {
    fn cache_created(&self, cache: &Arc<dyn ManagedCache>) -> Result<()> {
        let config = cache.config();
        if !config.management {
            return Ok(());
        }
        self.enable_configuration(cache)?;
        if config.statistics {
            self.enable_statistics(cache)?;
        }
        tracing::debug!("[management]: views of cache {} registered", cache.qualifier());
        Ok(())
    }

    fn cache_destroyed(&self, cache: &Arc<dyn ManagedCache>) -> Result<()> {
        let errs = [
            self.disable_statistics(cache.as_ref()),
            self.disable_configuration(cache.as_ref()),
        ]
        .into_iter()
        .filter_map(|res| res.err())
        .collect::<Vec<_>>();
        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::multiple(errs))
        }
    }
}
