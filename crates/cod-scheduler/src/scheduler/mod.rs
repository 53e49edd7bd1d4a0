//! Coalescing Scheduler
//!
//! Keyed single-flight engine. The first operation for a key becomes the
//! executor; operations that arrive while it is pending join it and are
//! resumed with the same outcome, in arrival order. Once the outcome is
//! delivered the key is forgotten, so later operations run fresh work.

mod continuation;
mod driver;
mod registry;

pub use continuation::{Callback, Continuation, Outcome};

use crate::config::SchedulerConfig;
use crate::error::{CoalesceError, ExecutionFailure};
use crate::key::KeyFunction;
use cod_response::{ExecutionId, OutputInterceptor, ResponseDescriptor};
use driver::{drive, Fanout};
use registry::{Registry, Slot};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::Instrument;

/// How `run` admitted an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Started a new execution for its key
    Leader {
        /// Execution started
        execution: ExecutionId,
    },
    /// Joined the pending execution for its key
    Joined {
        /// Execution joined
        execution: ExecutionId,
        /// Arrival position among the waiters (the leader is 0)
        position: usize,
    },
    /// Not coalescable; runs on its own
    Uncoalesced {
        /// Private execution
        execution: ExecutionId,
    },
}

impl Admission {
    /// Execution the operation is attached to
    #[inline]
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::Leader { execution }
            | Self::Joined { execution, .. }
            | Self::Uncoalesced { execution } => *execution,
        }
    }

    /// Whether this operation triggered a new execution
    #[inline]
    #[must_use]
    pub fn started_work(&self) -> bool {
        !matches!(self, Self::Joined { .. })
    }
}

struct Inner<F: KeyFunction> {
    key_fn: F,
    registry: Arc<Registry<F::Key>>,
    config: SchedulerConfig,
}

/// Keyed single-flight scheduler
///
/// Cloning is cheap and clones share one registry, so a single scheduler
/// can be handed to every request handler of a process.
pub struct CoalescingScheduler<F: KeyFunction> {
    inner: Arc<Inner<F>>,
}

impl<F: KeyFunction> Clone for CoalescingScheduler<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: KeyFunction> std::fmt::Debug for CoalescingScheduler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingScheduler")
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl<F: KeyFunction> CoalescingScheduler<F> {
    /// Create scheduler with default configuration
    #[must_use]
    pub fn new(key_fn: F) -> Self {
        Self::with_config(key_fn, SchedulerConfig::default())
    }

    /// Create scheduler with explicit configuration
    #[must_use]
    pub fn with_config(key_fn: F, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                key_fn,
                registry: Arc::new(Registry::new()),
                config,
            }),
        }
    }

    /// Scheduler configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Key function in use
    #[inline]
    #[must_use]
    pub fn key_function(&self) -> &F {
        &self.inner.key_fn
    }

    /// Admit an operation
    ///
    /// Computes the key for `ctx`, then either joins the pending execution
    /// for that key or starts `work` on a new Tokio task. Never waits for
    /// the work: `on_result` is resumed exactly once, later, with the
    /// shared outcome. When this returns `Err`, `on_result` is dropped
    /// without being resumed.
    ///
    /// # Errors
    /// - `CoalesceError::Key` if the key function fails
    /// - `CoalesceError::NoRuntime` outside a Tokio runtime
    /// - `CoalesceError::MaxInFlight` if a new key exceeds the configured limit
    pub fn run<W, Fut>(
        &self,
        ctx: &F::Context,
        work: W,
        on_result: Continuation,
    ) -> Result<Admission, CoalesceError>
    where
        W: FnOnce(OutputInterceptor) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.run_with_status(ctx, None, work, on_result)
    }

    /// Admit an operation whose caller already holds a status
    ///
    /// `status` is the caller's sink status at admission (for HTTP, what
    /// the transport set before the handler ran). It seeds the execution
    /// only when this operation starts one; a joiner's status is ignored
    /// and it receives the leader's.
    ///
    /// # Errors
    /// See [`run`](Self::run)
    pub fn run_with_status<W, Fut>(
        &self,
        ctx: &F::Context,
        status: Option<u16>,
        work: W,
        on_result: Continuation,
    ) -> Result<Admission, CoalesceError>
    where
        W: FnOnce(OutputInterceptor) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let key = self.inner.key_fn.key(ctx)?;
        let runtime = Handle::try_current().map_err(|_| CoalesceError::NoRuntime)?;
        let name = self.inner.config.name.as_str();

        let Some(key) = key else {
            let execution = ExecutionId::new();
            tracing::debug!(scheduler = name, %execution, "not coalescable, running alone");
            let span = tracing::debug_span!("execution", scheduler = name, %execution, coalesced = false);
            let single = drive::<F::Key, W, Fut>(execution, status, work, Fanout::Single(on_result));
            runtime.spawn(single.instrument(span));
            return Ok(Admission::Uncoalesced { execution });
        };

        let slot = self
            .inner
            .registry
            .join_or_create(key.clone(), on_result, self.inner.config.max_in_flight)
            .map_err(|rejected| {
                tracing::warn!(scheduler = name, ?key, limit = rejected.limit, "in-flight limit reached");
                CoalesceError::MaxInFlight {
                    limit: rejected.limit,
                }
            })?;

        match slot {
            Slot::Joined { execution, position } => {
                tracing::debug!(scheduler = name, ?key, %execution, position, "joined in-flight execution");
                Ok(Admission::Joined { execution, position })
            }
            Slot::Created { execution } => {
                tracing::debug!(scheduler = name, ?key, %execution, "starting execution");
                let span = tracing::debug_span!("execution", scheduler = name, %execution, ?key);
                let fanout = Fanout::Entry {
                    registry: Arc::clone(&self.inner.registry),
                    key,
                };
                runtime.spawn(drive(execution, status, work, fanout).instrument(span));
                Ok(Admission::Leader { execution })
            }
        }
    }

    /// Admit an operation and wait for its outcome
    ///
    /// Channel form of [`run`](Self::run).
    ///
    /// # Errors
    /// Everything `run` returns, plus `CoalesceError::Execution` when the
    /// shared execution failed
    pub async fn execute<W, Fut>(
        &self,
        ctx: &F::Context,
        work: W,
    ) -> Result<Arc<ResponseDescriptor>, CoalesceError>
    where
        W: FnOnce(OutputInterceptor) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.execute_with_status(ctx, None, work).await
    }

    /// Channel form of [`run_with_status`](Self::run_with_status)
    ///
    /// # Errors
    /// See [`execute`](Self::execute)
    pub async fn execute_with_status<W, Fut>(
        &self,
        ctx: &F::Context,
        status: Option<u16>,
        work: W,
    ) -> Result<Arc<ResponseDescriptor>, CoalesceError>
    where
        W: FnOnce(OutputInterceptor) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (on_result, outcome) = Continuation::channel();
        let admission = self.run_with_status(ctx, status, work, on_result)?;

        match outcome.await {
            Ok(outcome) => outcome.map_err(CoalesceError::from),
            Err(_) => Err(ExecutionFailure::Abandoned {
                execution: admission.execution_id(),
            }
            .into()),
        }
    }

    /// Number of executions currently pending
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.registry.in_flight()
    }

    /// Waiters queued on `key`, or `None` if nothing is pending for it
    #[inline]
    #[must_use]
    pub fn waiter_count(&self, key: &F::Key) -> Option<usize> {
        self.inner.registry.waiter_count(key)
    }

    /// Whether an execution is pending for `key`
    #[inline]
    #[must_use]
    pub fn is_pending(&self, key: &F::Key) -> bool {
        self.waiter_count(key).is_some()
    }
}
