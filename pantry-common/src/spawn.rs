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


use tokio::{
    runtime::{Handle, Runtime},
    task::JoinHandle,
};

/// The work-execution facility units of work are scheduled on for asynchronous completion.
///
/// A spawner refers to a runtime, it does not own it. The runtime must outlive the work spawned on it.
#[derive(Debug, Clone)]
pub struct Spawner {
    handle: Handle,
}

impl From<Handle> for Spawner {
    fn from(handle: Handle) -> Self {
        Self { handle }
    }
}

impl From<&Runtime> for Spawner {
    fn from(runtime: &Runtime) -> Self {
        Self {
            handle: runtime.handle().clone(),
        }
    }
}

impl Spawner {
    /// Run `func` on the blocking pool.
    ///
    /// Units of work block on per-key coordination, so they never run on the async workers. Dropping the returned
    /// handle detaches the work, it still runs to completion.
    pub fn spawn_blocking<F, R>(&self, func: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(func)
    }

    /// Get the spawner of the current runtime, if called within one.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::from)
    }

    /// The handle of the runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}
