//! Execution driver
//!
//! Runs one execution behind an [`OutputInterceptor`] and turns whatever
//! happens first (terminal call, error, panic, interceptor released) into
//! a single [`Outcome`], then fans it out.

use super::continuation::{Continuation, Outcome};
use super::registry::Registry;
use crate::error::ExecutionFailure;
use cod_response::{Completion, ExecutionId, OutputInterceptor, ResponseDescriptor};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

type Running = Pin<Box<dyn Future<Output = std::thread::Result<anyhow::Result<()>>> + Send>>;

/// Where an execution's outcome goes
pub(crate) enum Fanout<K: Hash + Eq> {
    /// Uncoalesced: a single private waiter
    Single(Continuation),
    /// Coalesced: every waiter queued on the registry entry
    Entry { registry: Arc<Registry<K>>, key: K },
}

/// Delivers exactly once; if dropped undelivered, waiters get `Abandoned`
struct DrainGuard<K: Hash + Eq + Clone> {
    execution: ExecutionId,
    fanout: Option<Fanout<K>>,
}

impl<K: Hash + Eq + Clone> DrainGuard<K> {
    fn deliver(&mut self, outcome: &Outcome) {
        let Some(fanout) = self.fanout.take() else {
            return;
        };
        match fanout {
            Fanout::Single(waiter) => waiter.resume(outcome.clone()),
            Fanout::Entry { registry, key } => {
                let waiters = registry.drain(&key, self.execution);
                tracing::debug!(execution = %self.execution, waiters = waiters.len(), "fanning out");
                for waiter in waiters {
                    waiter.resume(outcome.clone());
                }
            }
        }
    }
}

impl<K: Hash + Eq + Clone> Drop for DrainGuard<K> {
    fn drop(&mut self) {
        if self.fanout.is_some() {
            tracing::warn!(execution = %self.execution, "execution dropped before completing");
            let execution = self.execution;
            self.deliver(&Err(ExecutionFailure::Abandoned { execution }));
        }
    }
}

/// Run `work` once and deliver its outcome through `fanout`
///
/// `status` seeds the interceptor. The guard exists before the first poll,
/// so a task dropped unpolled still releases its waiters.
pub(crate) fn drive<K, W, Fut>(
    execution: ExecutionId,
    status: Option<u16>,
    work: W,
    fanout: Fanout<K>,
) -> impl Future<Output = ()> + Send + 'static
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    W: FnOnce(OutputInterceptor) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut guard = DrainGuard {
        execution,
        fanout: Some(fanout),
    };
    async move {
        let outcome = execute(execution, status, work).await;
        guard.deliver(&outcome);
    }
}

async fn execute<W, Fut>(execution: ExecutionId, status: Option<u16>, work: W) -> Outcome
where
    W: FnOnce(OutputInterceptor) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let (out, mut completion) = OutputInterceptor::with_status(execution, status);
    let mut running: Running = Box::pin(AssertUnwindSafe(async move { work(out).await }).catch_unwind());

    tokio::select! {
        biased;

        captured = &mut completion => match captured {
            Ok(descriptor) if descriptor.is_terminated() => {
                tokio::spawn(finish_in_background(execution, running));
                Ok(Arc::new(descriptor))
            }
            // Interceptor released early; the work's own result decides.
            Ok(descriptor) => match running.await {
                Ok(Ok(())) => unterminated(execution, descriptor),
                Ok(Err(error)) => Err(work_failure(execution, error)),
                Err(panic) => Err(panicked(execution, panic.as_ref())),
            },
            Err(_) => Err(ExecutionFailure::Abandoned { execution }),
        },

        finished = &mut running => match finished {
            Ok(Ok(())) => match completion.await {
                Ok(descriptor) if descriptor.is_terminated() => Ok(Arc::new(descriptor)),
                Ok(descriptor) => unterminated(execution, descriptor),
                Err(_) => Err(ExecutionFailure::Abandoned { execution }),
            },
            Ok(Err(error)) => settle_failure(execution, &mut completion, work_failure(execution, error)),
            Err(panic) => settle_failure(execution, &mut completion, panicked(execution, panic.as_ref())),
        },
    }
}

/// A terminal call that raced the failure still wins
fn settle_failure(execution: ExecutionId, completion: &mut Completion, failure: ExecutionFailure) -> Outcome {
    match completion.try_recv() {
        Ok(descriptor) if descriptor.is_terminated() => {
            tracing::warn!(%execution, error = %failure, "work failed after its terminal call");
            Ok(Arc::new(descriptor))
        }
        _ => {
            tracing::debug!(%execution, error = %failure, "execution failed");
            Err(failure)
        }
    }
}

fn unterminated(execution: ExecutionId, descriptor: ResponseDescriptor) -> Outcome {
    tracing::error!(
        %execution,
        contract = cod_response::TERMINAL_CONTRACT,
        "execution completed without a terminal call"
    );
    Ok(Arc::new(descriptor))
}

async fn finish_in_background(execution: ExecutionId, running: Running) {
    match running.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::warn!(%execution, %error, "work failed after completing its response"),
        Err(panic) => tracing::warn!(
            %execution,
            message = panic_message(panic.as_ref()),
            "work panicked after completing its response"
        ),
    }
}

fn work_failure(execution: ExecutionId, error: anyhow::Error) -> ExecutionFailure {
    ExecutionFailure::Work {
        execution,
        error: Arc::new(error),
    }
}

fn panicked(execution: ExecutionId, panic: &(dyn Any + Send)) -> ExecutionFailure {
    ExecutionFailure::Panicked {
        execution,
        message: panic_message(panic),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::registry::Slot;
    use cod_response::{Body, ResponseSink};

    fn send_now(mut out: OutputInterceptor) -> impl Future<Output = anyhow::Result<()>> + Send {
        async move {
            out.send(Body::from("never"))?;
            Ok(())
        }
    }

    #[test]
    fn unpolled_drive_abandons_its_waiter() {
        let execution = ExecutionId::new();
        let (waiter, mut rx) = Continuation::channel();

        drop(drive::<String, _, _>(execution, None, send_now, Fanout::Single(waiter)));

        match rx.try_recv().unwrap() {
            Err(ExecutionFailure::Abandoned { execution: abandoned }) => assert_eq!(abandoned, execution),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unpolled_drive_clears_its_entry() {
        let registry = Arc::new(Registry::new());
        let (waiter, mut rx) = Continuation::channel();
        let Ok(Slot::Created { execution }) = registry.join_or_create("k".to_string(), waiter, None) else {
            panic!("expected a new entry");
        };

        let fanout = Fanout::Entry {
            registry: Arc::clone(&registry),
            key: "k".to_string(),
        };
        drop(drive(execution, None, send_now, fanout));

        assert_eq!(registry.in_flight(), 0);
        assert!(rx.try_recv().unwrap().is_err());
    }

    #[tokio::test]
    async fn status_seed_reaches_the_descriptor() {
        let (waiter, mut rx) = Continuation::channel();
        drive::<String, _, _>(ExecutionId::new(), Some(203), send_now, Fanout::Single(waiter)).await;

        let descriptor = rx.try_recv().unwrap().unwrap();
        assert_eq!(descriptor.status_code(), Some(203));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let fixed: Box<dyn Any + Send> = Box::new("fixed message");
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(owned.as_ref()), "owned message");
        assert_eq!(panic_message(fixed.as_ref()), "fixed message");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
