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

//! Operations are immutable descriptions of the effect a caller wants applied to one key.
//!
//! Every operation is built per call and consumed by exactly one unit of work.

use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use crate::{
    code::{Key, Value},
    entry::{MutableEntry, ETERNAL},
    error::{Error, ErrorKind, Result},
};

/// The semantic effect of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Read the entry.
    Read,
    /// Insert or overwrite the entry.
    Write,
    /// Remove the entry.
    Remove,
    /// Mutate the entry only if a condition holds.
    ConditionalMutate,
    /// Set the expiry timestamp of the entry.
    Expire,
    /// Apply a user supplied entry processor.
    Invoke,
}

/// An operation applied to one entry by a unit of work.
pub trait Semantic<K, V>: Send + 'static {
    /// Result of the operation.
    type Output: Send + 'static;

    /// The semantic effect of the operation.
    fn kind(&self) -> OperationKind;

    /// Apply the operation on the entry view. Changes recorded on the view are committed only on success.
    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output>;
}

/// User supplied transformation of one entry.
///
/// Returning `Ok(None)` means the processor produced no result for the entry. An error aborts the processing of
/// the entry, none of the recorded changes are applied.
pub trait EntryProcessor<K, V, R>: Send + Sync + 'static {
    /// Process the entry.
    fn process(&self, entry: &mut MutableEntry<K, V>) -> anyhow::Result<Option<R>>;
}

impl<K, V, R, F> EntryProcessor<K, V, R> for F
where
    F: Fn(&mut MutableEntry<K, V>) -> anyhow::Result<Option<R>> + Send + Sync + 'static,
{
    fn process(&self, entry: &mut MutableEntry<K, V>) -> anyhow::Result<Option<R>> {
        self(entry)
    }
}

/// Read the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Get;

impl<K: Key, V: Value> Semantic<K, V> for Get {
    type Output = Option<V>;

    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        Ok(entry.value().cloned())
    }
}

/// Check whether the entry exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contains;

impl<K: Key, V: Value> Semantic<K, V> for Contains {
    type Output = bool;

    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        Ok(entry.exists())
    }
}

/// Insert or overwrite the value, optionally with an expiry timestamp.
#[derive(Debug, Clone)]
pub struct Put<V> {
    value: V,
    expire_at: Option<u64>,
}

impl<V> Put<V> {
    /// Put `value` without expiry.
    pub fn new(value: V) -> Self {
        Self { value, expire_at: None }
    }

    /// Put `value` expiring at `expire_at`.
    pub fn with_expiry(value: V, expire_at: Option<u64>) -> Self {
        Self { value, expire_at }
    }
}

impl<K: Key, V: Value> Semantic<K, V> for Put<V> {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::Write
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        entry.set_value(self.value);
        if let Some(at) = self.expire_at {
            entry.set_expiry(at);
        }
        Ok(())
    }
}

/// Insert the value and return the previous one.
#[derive(Debug, Clone)]
pub struct GetAndPut<V> {
    value: V,
    expire_at: Option<u64>,
}

impl<V> GetAndPut<V> {
    /// Put `value` expiring at `expire_at`.
    pub fn new(value: V, expire_at: Option<u64>) -> Self {
        Self { value, expire_at }
    }
}

impl<K: Key, V: Value> Semantic<K, V> for GetAndPut<V> {
    type Output = Option<V>;

    fn kind(&self) -> OperationKind {
        OperationKind::Write
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        let old = entry.value().cloned();
        entry.set_value(self.value);
        if let Some(at) = self.expire_at {
            entry.set_expiry(at);
        }
        Ok(old)
    }
}

/// Insert the value only if the entry does not exist.
///
/// Returns the present value if there is one, `None` if the value was inserted.
#[derive(Debug, Clone)]
pub struct PutIfAbsent<V> {
    value: V,
    expire_at: Option<u64>,
}

impl<V> PutIfAbsent<V> {
    /// Put `value` if absent, expiring at `expire_at`.
    pub fn new(value: V, expire_at: Option<u64>) -> Self {
        Self { value, expire_at }
    }
}

impl<K: Key, V: Value> Semantic<K, V> for PutIfAbsent<V> {
    type Output = Option<V>;

    fn kind(&self) -> OperationKind {
        OperationKind::ConditionalMutate
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        if let Some(present) = entry.value() {
            return Ok(Some(present.clone()));
        }
        entry.set_value(self.value);
        if let Some(at) = self.expire_at {
            entry.set_expiry(at);
        }
        Ok(None)
    }
}

/// Overwrite the value only if the entry exists.
///
/// Returns the replaced value, `None` if the entry does not exist.
#[derive(Debug, Clone)]
pub struct Replace<V> {
    value: V,
    expire_at: Option<u64>,
}

impl<V> Replace<V> {
    /// Replace with `value` if present, expiring at `expire_at`.
    pub fn new(value: V, expire_at: Option<u64>) -> Self {
        Self { value, expire_at }
    }
}

impl<K: Key, V: Value> Semantic<K, V> for Replace<V> {
    type Output = Option<V>;

    fn kind(&self) -> OperationKind {
        OperationKind::ConditionalMutate
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        let old = entry.value().cloned();
        if old.is_none() {
            return Ok(None);
        }
        entry.set_value(self.value);
        if let Some(at) = self.expire_at {
            entry.set_expiry(at);
        }
        Ok(old)
    }
}

/// Overwrite the value only if the current value equals the expected one.
#[derive(Debug, Clone)]
pub struct ReplaceIfEquals<V> {
    expected: V,
    value: V,
    expire_at: Option<u64>,
}

impl<V> ReplaceIfEquals<V> {
    /// Replace `expected` with `value`, expiring at `expire_at`.
    pub fn new(expected: V, value: V, expire_at: Option<u64>) -> Self {
        Self {
            expected,
            value,
            expire_at,
        }
    }
}

impl<K: Key, V: Value + PartialEq> Semantic<K, V> for ReplaceIfEquals<V> {
    type Output = bool;

    fn kind(&self) -> OperationKind {
        OperationKind::ConditionalMutate
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        if entry.value() != Some(&self.expected) {
            return Ok(false);
        }
        entry.set_value(self.value);
        if let Some(at) = self.expire_at {
            entry.set_expiry(at);
        }
        Ok(true)
    }
}

/// Remove the entry, report whether it existed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Remove;

impl<K: Key, V: Value> Semantic<K, V> for Remove {
    type Output = bool;

    fn kind(&self) -> OperationKind {
        OperationKind::Remove
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        if !entry.exists() {
            return Ok(false);
        }
        entry.remove();
        Ok(true)
    }
}

/// Remove the entry only if the current value equals the expected one.
#[derive(Debug, Clone)]
pub struct RemoveIfEquals<V> {
    expected: V,
}

impl<V> RemoveIfEquals<V> {
    /// Remove the entry if it holds `expected`.
    pub fn new(expected: V) -> Self {
        Self { expected }
    }
}

impl<K: Key, V: Value + PartialEq> Semantic<K, V> for RemoveIfEquals<V> {
    type Output = bool;

    fn kind(&self) -> OperationKind {
        OperationKind::ConditionalMutate
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        if entry.value() != Some(&self.expected) {
            return Ok(false);
        }
        entry.remove();
        Ok(true)
    }
}

/// Remove the entry and return the removed value.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetAndRemove;

impl<K: Key, V: Value> Semantic<K, V> for GetAndRemove {
    type Output = Option<V>;

    fn kind(&self) -> OperationKind {
        OperationKind::Remove
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        let old = entry.value().cloned();
        if old.is_some() {
            entry.remove();
        }
        Ok(old)
    }
}

/// Set the expiry timestamp of an existing entry.
///
/// [`NOW`](crate::entry::NOW) or any time not after the operation start removes the entry, [`ETERNAL`] clears the
/// expiry. Absent entries are left alone.
#[derive(Debug, Clone, Copy)]
pub struct Expire {
    at: u64,
}

impl Expire {
    /// Expire at `at` milliseconds since the unix epoch.
    pub fn new(at: u64) -> Self {
        Self { at }
    }
}

impl<K: Key, V: Value> Semantic<K, V> for Expire {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::Expire
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        if !entry.exists() {
            return Ok(());
        }
        if self.at != ETERNAL && self.at <= entry.start_time() {
            entry.remove();
        } else {
            entry.set_expiry(self.at);
        }
        Ok(())
    }
}

/// Apply an [`EntryProcessor`].
///
/// Processor failures are wrapped as [`ErrorKind::EntryProcessing`] errors whose source is the processor's error.
pub struct Invoke<P, R> {
    processor: Arc<P>,
    _marker: PhantomData<fn() -> R>,
}

impl<P, R> Debug for Invoke<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoke").finish()
    }
}

impl<P, R> Invoke<P, R> {
    /// Apply `processor`, shared with other invocations.
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            processor,
            _marker: PhantomData,
        }
    }
}

impl<K, V, R, P> Semantic<K, V> for Invoke<P, R>
where
    K: Key,
    V: Value,
    R: Send + 'static,
    P: EntryProcessor<K, V, R>,
{
    type Output = Option<R>;

    fn kind(&self) -> OperationKind {
        OperationKind::Invoke
    }

    fn apply(self, entry: &mut MutableEntry<K, V>) -> Result<Self::Output> {
        self.processor.process(entry).map_err(|e| {
            Error::new(ErrorKind::EntryProcessing, "entry processor failed")
                .with_context("key", format!("{:?}", entry.key()))
                .with_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Change, NOW};

    fn entry(value: Option<u64>) -> MutableEntry<&'static str, u64> {
        MutableEntry::new("k", value.map(|v| (v, None)), 1_000)
    }

    #[test]
    fn test_conditional_operations() {
        let mut e = entry(Some(1));
        assert_eq!(Semantic::apply(PutIfAbsent::new(2, None), &mut e).unwrap(), Some(1));
        assert!(!e.is_mutated());

        let mut e = entry(None);
        assert_eq!(Semantic::apply(Replace::new(2, None), &mut e).unwrap(), None);
        assert!(!e.is_mutated());
        assert_eq!(Semantic::apply(PutIfAbsent::new(2, None), &mut e).unwrap(), None);
        assert_eq!(e.value(), Some(&2));

        let mut e = entry(Some(1));
        assert_eq!(Semantic::apply(Replace::new(3, Some(5_000)), &mut e).unwrap(), Some(1));
        assert_eq!(e.value(), Some(&3));
        assert_eq!(e.expire_at(), Some(5_000));

        let mut e = entry(Some(1));
        assert_eq!(Semantic::apply(GetAndPut::new(4, None), &mut e).unwrap(), Some(1));
        assert_eq!(e.value(), Some(&4));

        let mut e = entry(Some(1));
        assert!(!Semantic::apply(ReplaceIfEquals::new(5, 2, None), &mut e).unwrap());
        assert!(Semantic::apply(ReplaceIfEquals::new(1, 2, None), &mut e).unwrap());
        assert_eq!(e.value(), Some(&2));

        let mut e = entry(Some(1));
        assert!(!Semantic::apply(RemoveIfEquals::new(5), &mut e).unwrap());
        assert!(Semantic::apply(RemoveIfEquals::new(1), &mut e).unwrap());
        assert!(!e.exists());
    }

    #[test]
    fn test_remove_operations() {
        let mut e = entry(None);
        assert!(!Semantic::apply(Remove, &mut e).unwrap());
        assert!(!e.is_mutated());

        let mut e = entry(Some(3));
        assert_eq!(Semantic::apply(GetAndRemove, &mut e).unwrap(), Some(3));
        assert_eq!(e.into_mutation().change, Some(Change::Remove));
    }

    #[test]
    fn test_expire() {
        let mut e = entry(None);
        Semantic::apply(Expire::new(5_000), &mut e).unwrap();
        assert!(!e.is_mutated());

        let mut e = entry(Some(1));
        Semantic::apply(Expire::new(NOW), &mut e).unwrap();
        assert!(!e.exists());

        let mut e = entry(Some(1));
        Semantic::apply(Expire::new(1_000), &mut e).unwrap();
        assert!(!e.exists());

        let mut e = entry(Some(1));
        Semantic::apply(Expire::new(5_000), &mut e).unwrap();
        assert_eq!(e.expire_at(), Some(5_000));

        let mut e = entry(Some(1));
        Semantic::apply(Expire::new(ETERNAL), &mut e).unwrap();
        assert_eq!(e.expire_at(), None);
        assert!(e.is_mutated());
    }

    #[test]
    fn test_invoke_wraps_processor_error() {
        let processor = |_: &mut MutableEntry<&'static str, u64>| -> anyhow::Result<Option<u64>> {
            Err(anyhow::anyhow!("boom"))
        };
        let mut e = entry(Some(1));
        let err = Semantic::apply(Invoke::<_, u64>::new(Arc::new(processor)), &mut e).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryProcessing);
        assert_eq!(err.context_value("key"), Some("\"k\""));
        assert_eq!(err.source().unwrap().to_string(), "boom");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Semantic::<&str, u64>::kind(&Get), OperationKind::Read);
        assert_eq!(Semantic::<&str, u64>::kind(&Put::new(1u64)), OperationKind::Write);
        assert_eq!(Semantic::<&str, u64>::kind(&Remove), OperationKind::Remove);
        assert_eq!(Semantic::<&str, u64>::kind(&Expire::new(NOW)), OperationKind::Expire);
    }
}
