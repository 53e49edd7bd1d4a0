//! Cache-on-demand middleware
//!
//! Wraps a request handler so that concurrent coalescable requests for the
//! same target share one handler run. Each caller's own sink receives a
//! replay of the captured response.

use crate::config::CodConfig;
use crate::context::RequestContext;
use crate::error::HandleError;
use crate::policy::HttpKeyPolicy;
use cod_response::{OutputInterceptor, ReplayDriver, ResponseSink, TERMINAL_CONTRACT};
use cod_scheduler::{CoalescingScheduler, KeyFunction, SchedulerConfig};
use std::future::Future;
use std::sync::Arc;

/// Request handler run behind the middleware
///
/// Writes its response through `out`; it must end with exactly one of
/// `send`, `redirect` or `end`.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    /// Handle one request
    async fn call(&self, request: RequestContext, out: OutputInterceptor) -> anyhow::Result<()>;
}

/// Coalescing middleware over a key policy
pub struct CacheOnDemand<P = HttpKeyPolicy>
where
    P: KeyFunction<Context = RequestContext>,
{
    scheduler: CoalescingScheduler<P>,
    replayer: ReplayDriver,
}

impl CacheOnDemand<HttpKeyPolicy> {
    /// Create middleware with the default policy and scheduler settings
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(CodConfig::default())
    }

    /// Create middleware from loaded configuration
    #[must_use]
    pub fn from_config(config: CodConfig) -> Self {
        Self::with_policy(HttpKeyPolicy::new(config.policy), config.scheduler)
    }
}

impl Default for CacheOnDemand<HttpKeyPolicy> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for CacheOnDemand<P>
where
    P: KeyFunction<Context = RequestContext>,
{
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            replayer: self.replayer,
        }
    }
}

impl<P> std::fmt::Debug for CacheOnDemand<P>
where
    P: KeyFunction<Context = RequestContext>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOnDemand")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<P> CacheOnDemand<P>
where
    P: KeyFunction<Context = RequestContext>,
{
    /// Create middleware with a custom key policy
    #[must_use]
    pub fn with_policy(policy: P, config: SchedulerConfig) -> Self {
        Self {
            scheduler: CoalescingScheduler::with_config(policy, config),
            replayer: ReplayDriver::new(),
        }
    }

    /// Underlying scheduler
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &CoalescingScheduler<P> {
        &self.scheduler
    }

    /// Serve `request` onto `sink`
    ///
    /// `work` runs at most once per in-flight key; when it joins a pending
    /// execution it is dropped unrun. A status already set on `sink` seeds
    /// the execution this request starts, so joiners receive it too. On
    /// error nothing has been written to `sink`, except when a replay write
    /// was rejected part way.
    ///
    /// # Errors
    /// - `HandleError::Key` if the policy cannot evaluate the request
    /// - `HandleError::Execution` if the shared execution failed
    /// - `HandleError::Replay` if the captured response never ended or the
    ///   sink rejected it
    /// - `HandleError::MaxInFlight` / `HandleError::NoRuntime` from admission
    pub async fn handle<S, W, Fut>(
        &self,
        request: &RequestContext,
        sink: &mut S,
        work: W,
    ) -> Result<(), HandleError>
    where
        S: ResponseSink + ?Sized,
        W: FnOnce(RequestContext, OutputInterceptor) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let owned = request.clone();
        let status = sink.status_code();
        let descriptor = self
            .scheduler
            .execute_with_status(request, status, move |out| work(owned, out))
            .await
            .map_err(|err| {
                tracing::warn!(method = %request.method, url = %request.target, error = %err, "request failed");
                HandleError::from(err)
            })?;

        self.replayer.replay(&descriptor, sink).map_err(|err| {
            if err.is_terminal_violation() {
                tracing::error!(
                    method = %request.method,
                    url = %request.target,
                    contract = TERMINAL_CONTRACT,
                    "handler finished without a terminal call"
                );
            } else {
                tracing::warn!(url = %request.target, error = %err, "replay rejected");
            }
            HandleError::from(err)
        })
    }

    /// Serve `request` onto `sink` with a shared [`Handler`]
    ///
    /// # Errors
    /// See [`handle`](Self::handle)
    pub async fn handle_with<S, H>(
        &self,
        request: &RequestContext,
        sink: &mut S,
        handler: Arc<H>,
    ) -> Result<(), HandleError>
    where
        S: ResponseSink + ?Sized,
        H: Handler + ?Sized + 'static,
    {
        self.handle(request, sink, move |request, out| async move {
            handler.call(request, out).await
        })
        .await
    }
}
