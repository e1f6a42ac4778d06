//! Completion bridge.
//!
//! A [`Deferred`] is the settling side of a one-shot completion and a
//! [`Completion`] is the awaiting side handed to the caller. `resolve` and
//! `reject` consume the deferred, so a completion is settled at most once by
//! construction; dropping an unsettled deferred rejects the completion with a
//! scheduler error instead of leaving it pending forever.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::bridge::BridgeError;

/// Create a linked deferred/completion pair.
pub fn deferred<T>() -> (Deferred<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Deferred { tx }, Completion { rx })
}

/// Settling side. Lives on the loop thread inside an after-phase.
pub struct Deferred<T> {
    tx: oneshot::Sender<Result<T, BridgeError>>,
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

impl<T> Deferred<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: BridgeError) {
        self.settle(Err(error));
    }

    /// Settle with an already-computed outcome.
    pub fn settle(self, outcome: Result<T, BridgeError>) {
        if self.tx.send(outcome).is_err() {
            // Caller dropped the completion; the outcome has nowhere to go.
            tracing::debug!("Completion dropped before settling");
        }
    }
}

/// Awaiting side. Resolves to the operation's value or its rejection.
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, BridgeError>>,
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

impl<T> Completion<T> {
    /// Settled outcome if already available, without waiting.
    pub fn try_take(&mut self) -> Option<Result<T, BridgeError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(abandoned())),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(abandoned())))
    }
}

fn abandoned() -> BridgeError {
    BridgeError::SchedulerFailed("operation was abandoned before it settled".to_string())
}
