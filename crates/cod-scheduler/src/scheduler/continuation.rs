//! Continuation handles queued on an in-flight entry

use crate::error::ExecutionFailure;
use cod_response::ResponseDescriptor;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;

/// What every waiter of one execution receives
pub type Outcome = Result<Arc<ResponseDescriptor>, ExecutionFailure>;

/// Callback resumed with an outcome
pub type Callback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Explicit handle resumed exactly once with an execution's outcome
pub enum Continuation {
    /// Callback invoked on the driving task
    ///
    /// Locked only so queued waiters are `Sync`; the lock is taken apart
    /// on resume, never contended.
    Callback(Mutex<Callback>),
    /// One-shot channel awaited by the caller
    Channel(oneshot::Sender<Outcome>),
}

impl Continuation {
    /// Continuation from a callback
    pub fn callback(f: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self::Callback(Mutex::new(Box::new(f)))
    }

    /// Continuation from a fresh channel, returning its receiving half
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self::Channel(tx), rx)
    }

    /// Deliver the outcome
    ///
    /// A panicking callback is contained so the remaining waiters of the
    /// same execution are still resumed.
    pub(crate) fn resume(self, outcome: Outcome) {
        match self {
            Self::Callback(f) => {
                let f = f.into_inner();
                if catch_unwind(AssertUnwindSafe(|| f(outcome))).is_err() {
                    tracing::error!("waiter callback panicked during fan-out");
                }
            }
            Self::Channel(tx) => {
                if tx.send(outcome).is_err() {
                    tracing::debug!("waiter stopped listening before fan-out");
                }
            }
        }
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Continuation::Callback"),
            Self::Channel(_) => f.write_str("Continuation::Channel"),
        }
    }
}
