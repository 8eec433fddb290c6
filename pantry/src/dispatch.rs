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

//! Single-operation executor.

use std::{fmt::Debug, marker::PhantomData};

use pantry_common::{
    action::{Completion, EntryAction, Pending},
    code::{Key, Value},
    error::{Error, ErrorKind, Result},
    operation::Semantic,
    spawn::Spawner,
    store::EntryStore,
};

/// Drives units of work built by the entry store through the execution protocol.
///
/// The dispatcher holds no locks. Per-key coordination is left to the actions the store builds.
pub struct Dispatcher<K, V, S> {
    store: S,
    spawner: Option<Spawner>,
    _marker: PhantomData<fn(K, V)>,
}

impl<K, V, S> Debug for Dispatcher<K, V, S>
where
    S: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store)
            .field("spawner", &self.spawner)
            .finish()
    }
}

impl<K, V, S> Dispatcher<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    /// Create a dispatcher over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            spawner: None,
            _marker: PhantomData,
        }
    }

    /// Run asynchronous units of work on `spawner` instead of the current runtime.
    pub fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// The entry store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configured spawner, if any.
    pub fn spawner(&self) -> Option<&Spawner> {
        self.spawner.as_ref()
    }

    /// Execute `op` on `key` on the calling thread.
    ///
    /// A failure outcome is returned as is, except that its backtrace is recaptured here.
    pub fn execute<O>(&self, key: K, op: O) -> Result<O::Output>
    where
        O: Semantic<K, V>,
    {
        self.execute_with(key, None, op)
    }

    /// Execute `op` on `key`, skipping the entry lookup if `entry` has been resolved by the caller.
    pub fn execute_with<O>(&self, key: K, entry: Option<S::Entry>, op: O) -> Result<O::Output>
    where
        O: Semantic<K, V>,
    {
        let action = self.store.action(key, entry, op, Completion::synchronous());
        Self::run(action)
    }

    fn run<A>(mut action: A) -> Result<A::Output>
    where
        A: EntryAction,
    {
        action.start();
        Self::finish(action)
    }

    fn finish<A>(mut action: A) -> Result<A::Output>
    where
        A: EntryAction,
    {
        action.completion().take_outcome().map_err(Error::refresh_backtrace)
    }

    /// Execute `op` on `key` on the blocking pool of the spawner.
    ///
    /// The action is bound to a notification channel when built, the returned [`Pending`] resolves with its outcome.
    /// Fails with [`ErrorKind::Config`] if no spawner is configured and the caller is not within a tokio runtime.
    pub fn execute_async<O>(&self, key: K, op: O) -> Result<Pending<O::Output>>
    where
        O: Semantic<K, V>,
    {
        let spawner = match self.spawner.clone().or_else(Spawner::try_current) {
            Some(spawner) => spawner,
            None => {
                return Err(Error::new(
                    ErrorKind::Config,
                    "asynchronous execution requires a spawner or a tokio runtime",
                ))
            }
        };

        let (completion, pending) = Completion::notify();
        let mut action = self.store.action(key, None, op, completion);
        // The outcome is delivered through `pending`, the join handle carries nothing.
        drop(spawner.spawn_blocking(move || action.start()));
        Ok(pending)
    }
}
