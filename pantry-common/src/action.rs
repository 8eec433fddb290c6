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

//! The unit-of-work contract.
//!
//! An action binds one operation to one key and runs through `Pending -> Started -> Completed`. Its terminal outcome
//! is delivered through exactly one [`Completion`] channel chosen when the action is built: either stored for a
//! synchronous reader, or sent to an asynchronous waiter.

use std::{
    fmt::Debug,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use crate::error::{Error, ErrorKind, Result};

/// Lifecycle state of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Constructed, not started.
    Pending,
    /// The execution protocol has been invoked.
    Started,
    /// The terminal outcome is available.
    Completed,
}

enum Channel<R> {
    Stored(Option<Result<R>>),
    Notify(Option<oneshot::Sender<Result<R>>>),
}

/// Terminal outcome holder of a unit of work.
///
/// The outcome is set at most once. Transitions are checked with assertions, misuse is a programming error.
pub struct Completion<R> {
    state: ActionState,
    channel: Channel<R>,
}

impl<R> Debug for Completion<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channel = match self.channel {
            Channel::Stored(_) => "stored",
            Channel::Notify(_) => "notify",
        };
        f.debug_struct("Completion")
            .field("state", &self.state)
            .field("channel", &channel)
            .finish()
    }
}

impl<R> Completion<R> {
    /// Completion whose outcome is stored for a synchronous reader.
    pub fn synchronous() -> Self {
        Self {
            state: ActionState::Pending,
            channel: Channel::Stored(None),
        }
    }

    /// Completion whose outcome is sent to the returned [`Pending`] waiter.
    pub fn notify() -> (Self, Pending<R>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            state: ActionState::Pending,
            channel: Channel::Notify(Some(tx)),
        };
        (completion, Pending { rx })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActionState {
        self.state
    }

    /// Whether the outcome is delivered through the notification channel.
    pub fn is_notify(&self) -> bool {
        matches!(self.channel, Channel::Notify(_))
    }

    /// Transition `Pending -> Started`.
    pub fn begin(&mut self) {
        assert_eq!(self.state, ActionState::Pending, "unit of work started twice");
        self.state = ActionState::Started;
    }

    /// Transition `Started -> Completed` with the terminal outcome.
    pub fn complete(&mut self, outcome: Result<R>) {
        assert_eq!(
            self.state,
            ActionState::Started,
            "unit of work completed without being started, or completed twice"
        );
        self.state = ActionState::Completed;
        match &mut self.channel {
            Channel::Stored(slot) => *slot = Some(outcome),
            Channel::Notify(tx) => {
                if let Some(tx) = tx.take() {
                    // The waiter may have given up, the outcome is dropped then.
                    let _ = tx.send(outcome);
                }
            }
        }
    }

    /// Take the stored terminal outcome.
    ///
    /// # Panics
    ///
    /// Panics if the action has not completed, if the outcome has been taken, or if the completion delivers its
    /// outcome through the notification channel.
    pub fn take_outcome(&mut self) -> Result<R> {
        assert_eq!(
            self.state,
            ActionState::Completed,
            "outcome read before the unit of work completed"
        );
        match &mut self.channel {
            Channel::Stored(slot) => match slot.take() {
                Some(outcome) => outcome,
                None => panic!("outcome of the unit of work has already been taken"),
            },
            Channel::Notify(_) => panic!("the outcome of an asynchronous unit of work is delivered to its waiter"),
        }
    }
}

/// Waiter of an asynchronously completed unit of work.
#[derive(Debug)]
pub struct Pending<R> {
    rx: oneshot::Receiver<Result<R>>,
}

impl<R> Future for Pending<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(e)) => Poll::Ready(Err(Error::new(
                ErrorKind::ChannelClosed,
                "unit of work dropped before completion",
            )
            .with_source(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// One operation bound to one key.
///
/// Implementations are provided by the entry store. `start` runs the operation, acquiring whatever per-key
/// coordination the store needs, and completes the [`Completion`] before returning or, for stores that complete
/// later, from another thread.
pub trait EntryAction: Send {
    /// Result type of the bound operation.
    type Output;

    /// Start executing the unit of work.
    fn start(&mut self);

    /// The completion of the unit of work.
    fn completion(&mut self) -> &mut Completion<Self::Output>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synchronous_completion() {
        let mut completion = Completion::<u64>::synchronous();
        assert_eq!(completion.state(), ActionState::Pending);
        assert!(!completion.is_notify());

        completion.begin();
        assert_eq!(completion.state(), ActionState::Started);

        completion.complete(Ok(42));
        assert_eq!(completion.state(), ActionState::Completed);
        assert_eq!(completion.take_outcome().unwrap(), 42);
    }

    #[test]
    #[should_panic(expected = "outcome read before the unit of work completed")]
    fn test_read_before_completion() {
        let mut completion = Completion::<u64>::synchronous();
        completion.begin();
        let _ = completion.take_outcome();
    }

    #[test]
    #[should_panic(expected = "unit of work started twice")]
    fn test_start_twice() {
        let mut completion = Completion::<u64>::synchronous();
        completion.begin();
        completion.begin();
    }

    #[test]
    #[should_panic(expected = "completed twice")]
    fn test_complete_twice() {
        let mut completion = Completion::<u64>::synchronous();
        completion.begin();
        completion.complete(Ok(1));
        completion.complete(Ok(2));
    }

    #[test_log::test(tokio::test)]
    async fn test_notify_completion() {
        let (mut completion, pending) = Completion::<u64>::notify();
        assert!(completion.is_notify());
        completion.begin();
        completion.complete(Err(Error::unsupported("test")));
        let err = pending.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test_log::test(tokio::test)]
    async fn test_notify_dropped() {
        let (completion, pending) = Completion::<u64>::notify();
        drop(completion);
        let err = pending.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelClosed);
    }

    #[test]
    #[should_panic(expected = "delivered to its waiter")]
    fn test_notify_has_no_stored_outcome() {
        let (mut completion, _pending) = Completion::<u64>::notify();
        completion.begin();
        completion.complete(Ok(1));
        let _ = completion.take_outcome();
    }
}
