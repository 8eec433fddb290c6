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

use std::fmt::Debug;

/// Handle of a secondary storage tier attached to a cache.
///
/// The persistence format of the tier is not visible here. Caches without a storage tier are heap-only.
pub trait StorageAdapter: Send + Sync + Debug + 'static {
    /// Name of the storage tier, reported in the statistics view.
    fn name(&self) -> &str;
}
