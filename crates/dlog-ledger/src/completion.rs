//! Bridge from callback-style store completions to futures.
//!
//! The ledger store reports each request through a single callback carrying
//! either a result or a numeric [`StatusCode`]. Each call site creates a
//! [`Completer`]/[`Completion`] pair, moves the completer into the callback,
//! and hands the completion back to its caller. The completion resolves
//! exactly once; later completions are discarded.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{LedgerError, LedgerResult};
use crate::status::StatusCode;

type Slot<T, E> = Arc<Mutex<Option<oneshot::Sender<Result<T, E>>>>>;

/// Write side of a single-assignment completion.
///
/// Clones share one slot: whichever clone completes first wins.
pub struct Completer<T, E = LedgerError> {
    slot: Slot<T, E>,
}

impl<T, E> Completer<T, E> {
    /// Resolve the completion.
    ///
    /// Returns `true` if this call resolved it and the caller was still
    /// waiting. A duplicate completion, or one arriving after the caller
    /// dropped its [`Completion`], returns `false` and drops `result`, so
    /// any handle it owns releases itself.
    pub fn complete(&self, result: Result<T, E>) -> bool {
        let sender = self
            .slot
            .lock()
            .expect("completion lock poisoned")
            .take();
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn succeed(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(&self, error: E) -> bool {
        self.complete(Err(error))
    }

    /// Returns `true` once any clone has completed.
    pub fn is_completed(&self) -> bool {
        self.slot
            .lock()
            .expect("completion lock poisoned")
            .is_none()
    }
}

impl<T, E> Clone for Completer<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> fmt::Debug for Completer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("completed", &self.is_completed())
            .finish()
    }
}

enum State<T, E> {
    Ready(Option<Result<T, E>>),
    Pending(oneshot::Receiver<Result<T, E>>),
}

/// Read side of a single-assignment completion.
///
/// Resolves with the value passed to [`Completer::complete`]. If every
/// completer is dropped without completing, resolves with
/// [`LedgerError::Interrupted`].
#[must_use = "a completion does nothing unless awaited; the request is already issued"]
pub struct Completion<T, E = LedgerError> {
    state: State<T, E>,
}

impl<T, E> Completion<T, E> {
    /// A completion that is already resolved. Used when a request cannot
    /// even be issued.
    pub fn ready(result: Result<T, E>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }
}

// Fields are never pinned: the receiver is `Unpin` and the ready value is
// moved out by `take`.
impl<T, E> Unpin for Completion<T, E> {}

impl<T, E> Future for Completion<T, E>
where
    E: From<LedgerError>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Ready(slot) => Poll::Ready(slot.take().unwrap_or_else(|| {
                Err(LedgerError::Interrupted("completion polled after resolution".into()).into())
            })),
            State::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(_)) => Poll::Ready(Err(LedgerError::Interrupted(
                    "ledger request".into(),
                )
                .into())),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<T, E> fmt::Debug for Completion<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready(_) => "ready",
            State::Pending(_) => "pending",
        };
        f.debug_struct("Completion").field("state", &state).finish()
    }
}

/// Create a linked completer/completion pair.
pub fn completion<T, E>() -> (Completer<T, E>, Completion<T, E>) {
    let (tx, rx) = oneshot::channel();
    (
        Completer {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        Completion {
            state: State::Pending(rx),
        },
    )
}

/// Issue a request and return the completion its callback will resolve.
///
/// `issue` runs immediately; the request is in flight before this returns.
pub fn submit<T, E, F>(issue: F) -> Completion<T, E>
where
    F: FnOnce(Completer<T, E>),
{
    let (completer, completion) = completion();
    issue(completer);
    completion
}

/// Classify a store result: any status code becomes a transmission error
/// describing the target of the request.
pub fn classify<T>(
    result: Result<T, StatusCode>,
    describe: impl FnOnce() -> String,
) -> LedgerResult<T> {
    result.map_err(|code| LedgerError::transmit(describe(), code))
}
