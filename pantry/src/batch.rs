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

//! Batch invocation engine.

use std::{fmt::Debug, sync::Arc};

use hashbrown::HashMap;
use pantry_common::{
    code::{Key, Value},
    error::{Error, ErrorKind, Result},
    operation::{EntryProcessor, Invoke},
    store::EntryStore,
};

use crate::dispatch::Dispatcher;

/// Outcome of one key of a batch invocation.
///
/// Either the value produced by the entry processor or the cause of its failure, never both.
pub enum EntryProcessingResult<R> {
    /// The processor produced a value.
    Success(R),
    /// The processor failed. The cause is kept as raised by the processor.
    Failure(Arc<anyhow::Error>),
}

impl<R> Debug for EntryProcessingResult<R>
where
    R: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success(value) => f.debug_tuple("Success").field(value).finish(),
            Self::Failure(cause) => f.debug_tuple("Failure").field(&format_args!("{cause:#}")).finish(),
        }
    }
}

impl<R> Clone for EntryProcessingResult<R>
where
    R: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Success(value) => Self::Success(value.clone()),
            Self::Failure(cause) => Self::Failure(cause.clone()),
        }
    }
}

impl<R> EntryProcessingResult<R> {
    /// The produced value.
    ///
    /// A recorded failure is raised here, as an [`ErrorKind::EntryProcessing`] error whose source is the cause.
    pub fn result(&self) -> Result<&R> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(cause) => Err(Self::raise(cause)),
        }
    }

    /// Consume the record into the produced value, raising a recorded failure.
    pub fn into_result(self) -> Result<R> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(cause) => Err(Self::raise(&cause)),
        }
    }

    /// The recorded failure cause, if any.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(cause) => Some(cause),
        }
    }

    /// Whether the processor produced a value.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    fn raise(cause: &Arc<anyhow::Error>) -> Error {
        Error::new(ErrorKind::EntryProcessing, "entry processor failed").with_shared_source(cause.clone())
    }
}

impl<K, V, S> Dispatcher<K, V, S>
where
    K: Key,
    V: Value,
    S: EntryStore<K, V>,
{
    /// Apply `processor` to every key in order.
    ///
    /// Each key goes through the single-key path on its own. A failing key is recorded and never stops the remaining
    /// keys. Keys whose processor produced no value are left out of the result. A key given more than once is
    /// processed once per occurrence: a later success or failure replaces the recorded outcome, a later occurrence
    /// without a value keeps it.
    pub fn invoke_all<I, P, R>(&self, keys: I, processor: Arc<P>) -> HashMap<K, EntryProcessingResult<R>>
    where
        I: IntoIterator<Item = K>,
        P: EntryProcessor<K, V, R>,
        R: Send + 'static,
    {
        let keys = keys.into_iter();
        let mut results = HashMap::with_capacity(keys.size_hint().0);

        for key in keys {
            match self.execute(key.clone(), Invoke::<P, R>::new(processor.clone())) {
                Ok(Some(value)) => {
                    results.insert(key, EntryProcessingResult::Success(value));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("[batch]: entry processor failed on key {key:?}: {e}");
                    results.insert(key, EntryProcessingResult::Failure(Self::cause(e)));
                }
            }
        }

        results
    }

    /// Unwrap the processor failure from its envelope. Failures raised elsewhere are kept whole.
    fn cause(e: Error) -> Arc<anyhow::Error> {
        match (e.kind(), e.shared_source()) {
            (ErrorKind::EntryProcessing, Some(source)) => source.clone(),
            _ => Arc::new(anyhow::Error::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pantry_common::{
        entry::MutableEntry,
        operation::{Get, Put},
    };
    use pantry_memory::HeapStore;

    use super::*;

    #[derive(Debug, thiserror::Error, PartialEq, Eq)]
    #[error("cannot process {0}")]
    struct ProcessError(String);

    fn dispatcher() -> Dispatcher<String, u64, HeapStore<String, u64>> {
        let dispatcher = Dispatcher::new(HeapStore::new(4));
        for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
            dispatcher.execute(key.to_string(), Put::new(i as u64)).unwrap();
        }
        dispatcher
    }

    fn increment(entry: &mut MutableEntry<String, u64>) -> anyhow::Result<Option<u64>> {
        if entry.key() == "b" {
            return Err(ProcessError(entry.key().clone()).into());
        }
        let value = entry.value().copied().unwrap_or_default() + 1;
        entry.set_value(value);
        Ok(Some(value))
    }

    #[test_log::test]
    fn test_failure_is_isolated() {
        let dispatcher = dispatcher();
        let keys = ["a", "b", "c"].map(String::from);
        let results: HashMap<_, EntryProcessingResult<u64>> = dispatcher.invoke_all(keys, Arc::new(increment));

        assert_eq!(results.len(), 3);
        assert_eq!(results["a"].result().unwrap(), &1);
        assert_eq!(results["c"].result().unwrap(), &3);

        let failure = &results["b"];
        assert!(!failure.is_success());
        assert_eq!(
            failure.failure().unwrap().downcast_ref::<ProcessError>(),
            Some(&ProcessError("b".to_string()))
        );
        let err = failure.result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryProcessing);
        assert_eq!(err.downcast_ref::<ProcessError>(), Some(&ProcessError("b".to_string())));

        // The failed key is left untouched, the others are committed.
        assert_eq!(dispatcher.execute("b".to_string(), Get).unwrap(), Some(1));
        assert_eq!(dispatcher.execute("c".to_string(), Get).unwrap(), Some(3));
    }

    #[test_log::test]
    fn test_absent_results_are_skipped() {
        let dispatcher = dispatcher();
        let processor = |entry: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> {
            Ok(entry.value().copied().filter(|v| v % 2 == 0))
        };
        let keys = ["a", "b", "c", "missing"].map(String::from);
        let results: HashMap<_, EntryProcessingResult<u64>> = dispatcher.invoke_all(keys, Arc::new(processor));

        let mut present = results.keys().cloned().collect::<Vec<_>>();
        present.sort();
        assert_eq!(present, vec!["a".to_string(), "c".to_string()]);
    }

    #[test_log::test]
    fn test_duplicate_keys_are_processed_per_occurrence() {
        let dispatcher = dispatcher();
        let keys = ["a", "a", "a"].map(String::from);
        let results: HashMap<_, EntryProcessingResult<u64>> = dispatcher.invoke_all(keys, Arc::new(increment));

        assert_eq!(results.len(), 1);
        assert_eq!(results["a"].clone().into_result().unwrap(), 3);
    }

    #[test_log::test]
    fn test_duplicate_key_without_value_keeps_outcome() {
        let dispatcher = dispatcher();
        // Yields a value on the first visit of each key only.
        let once = |entry: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> {
            let value = entry.value().copied().unwrap_or_default();
            if value >= 100 {
                return Ok(None);
            }
            entry.set_value(value + 100);
            Ok(Some(7))
        };
        let keys = ["a", "a", "c", "c"].map(String::from);
        let results: HashMap<_, EntryProcessingResult<u64>> = dispatcher.invoke_all(keys, Arc::new(once));

        assert_eq!(results.len(), 2);
        assert_eq!(results["a"].result().unwrap(), &7);
        assert_eq!(results["c"].result().unwrap(), &7);
        assert_eq!(dispatcher.execute("a".to_string(), Get).unwrap(), Some(100));
    }

    #[test_log::test]
    fn test_duplicate_key_failure_then_success() {
        let dispatcher = dispatcher();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let flaky = move |entry: &mut MutableEntry<String, u64>| -> anyhow::Result<Option<u64>> {
            if counter.fetch_add(1, Ordering::Relaxed) == 0 {
                return Err(ProcessError(entry.key().clone()).into());
            }
            Ok(entry.value().copied())
        };
        let keys = ["b", "b"].map(String::from);
        let results: HashMap<_, EntryProcessingResult<u64>> = dispatcher.invoke_all(keys, Arc::new(flaky));

        assert_eq!(attempts.load(Ordering::Relaxed), 2);
        assert_eq!(results["b"].result().unwrap(), &1);
    }

    #[test]
    fn test_empty_batch() {
        let dispatcher = dispatcher();
        let results: HashMap<_, EntryProcessingResult<u64>> =
            dispatcher.invoke_all(Vec::<String>::new(), Arc::new(increment));
        assert!(results.is_empty());
    }
}
