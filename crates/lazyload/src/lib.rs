//! # Single-flight lazy values
//!
//! `Lazy` wraps an asynchronous producer so that it runs at most once per
//! successful load, however many tasks ask for the value.
//!
//! ## Rules
//!
//! - A resolved value is cached for the lifetime of the `Lazy` and returned
//!   without running the producer again.
//! - While an attempt is in flight every caller awaits that same attempt and
//!   observes the same value or the same failure.
//! - A failed attempt is not cached. The in-flight slot is cleared and the
//!   next call starts a fresh attempt.
//! - Attempts are spawned onto the tokio runtime and run to completion even
//!   if every caller stops waiting.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;

/// Why a load attempt did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The producer returned an error.
    Failed(E),
    /// The producer panicked.
    Panicked(String),
    /// The runtime cancelled the attempt (usually because it is shutting down).
    Aborted(String),
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "{}", e),
            Self::Panicked(msg) => write!(f, "Producer panicked: {}", msg),
            Self::Aborted(msg) => write!(f, "Load aborted: {}", msg),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Error<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(e) => e.source(),
            _ => None,
        }
    }
}

pub type Result<T, E> = std::result::Result<T, Error<E>>;

type Producer<T, E> = Box<dyn Fn() -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync>;
type Pending<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

enum Slot<T, E> {
    Empty,
    Loading { attempt: u64, pending: Pending<T, E> },
    Ready(T),
}

struct State<T, E> {
    slot: Slot<T, E>,
    attempts: u64,
}

/// A value produced asynchronously on first use and shared afterwards.
///
/// `Lazy` is an owned object, not ambient global state: whoever needs the
/// value shares it explicitly, typically as `Arc<Lazy<T, E>>`.
pub struct Lazy<T, E> {
    producer: Producer<T, E>,
    state: Arc<Mutex<State<T, E>>>,
}

impl<T, E> Lazy<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    /// Creates an empty cache around `producer`. Nothing runs until [`Lazy::get`].
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        Self {
            producer: Box::new(move || producer().boxed()),
            state: Arc::new(Mutex::new(State {
                slot: Slot::Empty,
                attempts: 0,
            })),
        }
    }

    /// Returns the cached value, joining or starting a load as needed.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get(&self) -> Result<T, E> {
        let pending = {
            // No await while the guard is held: check-then-set is atomic.
            let mut state = lock(&self.state);

            let in_flight = match &state.slot {
                Slot::Ready(value) => return Ok(value.clone()),
                Slot::Loading { pending, .. } => Some(pending.clone()),
                Slot::Empty => None,
            };

            match in_flight {
                Some(pending) => pending,
                None => {
                    state.attempts += 1;
                    let attempt = state.attempts;
                    let pending = self.start(attempt);
                    state.slot = Slot::Loading {
                        attempt,
                        pending: pending.clone(),
                    };
                    pending
                }
            }
        };

        pending.await
    }

    /// Returns the cached value if a load has already succeeded.
    pub fn peek(&self) -> Option<T> {
        match &lock(&self.state).slot {
            Slot::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// True while an attempt is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(lock(&self.state).slot, Slot::Loading { .. })
    }

    /// Number of times the producer has been invoked.
    pub fn attempts(&self) -> u64 {
        lock(&self.state).attempts
    }

    fn start(&self, attempt: u64) -> Pending<T, E> {
        tracing::debug!(attempt, "starting lazy load");

        let load = (self.producer)();
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(load).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(Error::Failed(e)),
                Err(panic) => Err(Error::Panicked(panic_message(panic.as_ref()))),
            };
            settle(&state, attempt, &result);
            result
        });

        let state = Arc::clone(&self.state);
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    let result = Err(Error::Aborted(e.to_string()));
                    settle(&state, attempt, &result);
                    result
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Records the outcome of `attempt`, unless a newer attempt already owns the slot.
fn settle<T, E>(state: &Mutex<State<T, E>>, attempt: u64, result: &Result<T, E>)
where
    T: Clone,
    E: fmt::Display,
{
    let mut state = lock(state);

    let owns_slot = matches!(
        &state.slot,
        Slot::Loading { attempt: current, .. } if *current == attempt
    );
    if !owns_slot {
        return;
    }

    state.slot = match result {
        Ok(value) => {
            tracing::debug!(attempt, "lazy load resolved");
            Slot::Ready(value.clone())
        }
        Err(e) => {
            tracing::warn!(attempt, error = %e, "lazy load failed, next call will retry");
            Slot::Empty
        }
    };
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests;
