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

pub use pantry_common::{
    action::{ActionState, Completion, EntryAction, Pending},
    code::{Key, Value},
    entry::{CacheEntry, MutableEntry, ETERNAL, NOW},
    error::{Error, ErrorKind, Result},
    operation::{EntryProcessor, OperationKind, Semantic},
    spawn::Spawner,
    store::EntryStore,
};
pub use pantry_memory::HeapStore;

pub use crate::{
    batch::EntryProcessingResult,
    cache::Cache,
    capability::{CacheInterface, Capabilities, ConcurrentMapView, Interface, MapView},
    config::{CacheBuilder, CacheConfig},
    customization::{
        instance, CacheWriter, Customization, CustomizationSupplier, ExpireAfterWrite, ExpiryPolicy, Releasable,
    },
    dispatch::Dispatcher,
    manager::{CacheLifecycleListener, CacheManager, ManagedCache},
    management::{LocalManagementServer, ManagedBean, ManagementServer, ManagementSupport, RegistrationError},
    status::CacheInfo,
    storage::StorageAdapter,
    view::{Entries, Keys},
};
