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

//! pantry is the operation dispatch and batch processing core of an in-process cache.
//!
//! Cache calls are turned into per-key units of work on an entry store and executed on the calling thread. Batch
//! invocation isolates per-key failures, views are projected from the store iterator without a second mutation
//! path, and pluggable customizations are created lazily and released once when the cache is closed.

/// Batch invocation engine.
pub mod batch;
mod cache;
/// Capability negotiation and map adapters.
pub mod capability;
/// Cache configuration and builder.
pub mod config;
/// Lifecycle of user-supplied pluggable components.
pub mod customization;
/// Single-operation executor.
pub mod dispatch;
/// Cache manager and cache lifecycle notifications.
pub mod manager;
/// Management views of caches.
pub mod management;
/// Operation counters.
pub mod statistics;
/// Status rendering.
pub mod status;
/// Secondary storage tier handle.
pub mod storage;
/// Read-only key and entry views.
pub mod view;

/// Re-exports of the commonly used types.
pub mod prelude;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use crate::cache::Cache;
