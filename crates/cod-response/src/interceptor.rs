//! Output Interceptor
//!
//! Recorder standing in for a live sink during exactly one execution.
//! Header and status writes accumulate in a [`DescriptorBuilder`]; the first
//! terminal call finalizes the descriptor and fires the completion signal.
//!
//! The live sink is never touched while the execution runs, so there is
//! nothing to restore on it afterwards. If the interceptor is dropped before
//! any terminal call (the work failed, panicked, or simply returned), the
//! completion still fires from `Drop` with the unterminated descriptor.

use crate::descriptor::{Body, DescriptorBuilder, ExecutionId, Redirect, ResponseDescriptor, Terminal};
use crate::error::SinkError;
use crate::sink::ResponseSink;
use tokio::sync::oneshot;

/// Receiving half of an interceptor's completion signal
pub type Completion = oneshot::Receiver<ResponseDescriptor>;

/// Recording sink bound to one execution
#[derive(Debug)]
pub struct OutputInterceptor {
    execution: ExecutionId,
    builder: Option<DescriptorBuilder>,
    status: Option<u16>,
    finalized_by: Option<&'static str>,
    completer: Option<oneshot::Sender<ResponseDescriptor>>,
}

impl OutputInterceptor {
    /// Create an interceptor and the completion it will signal
    #[must_use]
    pub fn new(execution: ExecutionId) -> (Self, Completion) {
        let (completer, completion) = oneshot::channel();
        let interceptor = Self {
            execution,
            builder: Some(DescriptorBuilder::default()),
            status: None,
            finalized_by: None,
            completer: Some(completer),
        };
        (interceptor, completion)
    }

    /// Create an interceptor starting from a status snapshot
    ///
    /// A status the transport set before interception is then captured
    /// unless the execution overrides it.
    #[must_use]
    pub fn with_status(execution: ExecutionId, status: Option<u16>) -> (Self, Completion) {
        let (mut interceptor, completion) = Self::new(execution);
        if let Some(code) = status {
            interceptor.record_status(code);
        }
        (interceptor, completion)
    }

    /// Create an interceptor seeded with a live sink's current status
    #[must_use]
    pub fn seeded<S: ResponseSink + ?Sized>(execution: ExecutionId, live: &S) -> (Self, Completion) {
        Self::with_status(execution, live.status_code())
    }

    /// Execution this interceptor records
    #[inline]
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution
    }

    /// Whether a terminal call has fired
    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized_by.is_some()
    }

    fn record_status(&mut self, code: u16) {
        if let Some(builder) = self.builder.as_mut() {
            builder.status(code);
            self.status = Some(code);
        }
    }

    fn recording(&mut self) -> Result<&mut DescriptorBuilder, SinkError> {
        if let Some(by) = self.finalized_by {
            return Err(self.violation(by));
        }
        self.builder
            .as_mut()
            .ok_or_else(|| SinkError::rejected("interceptor is no longer recording"))
    }

    fn violation(&self, by: &'static str) -> SinkError {
        tracing::warn!(
            execution = %self.execution,
            finalized_by = by,
            "write after terminal call ignored"
        );
        SinkError::AlreadyFinalized(by)
    }

    fn finish(&mut self, terminal: Terminal) -> Result<(), SinkError> {
        if let Some(by) = self.finalized_by {
            return Err(self.violation(by));
        }
        let builder = self
            .builder
            .take()
            .ok_or_else(|| SinkError::rejected("interceptor is no longer recording"))?;

        let call = terminal.call_name();
        self.finalized_by = Some(call);
        tracing::debug!(execution = %self.execution, call, status = ?self.status, "execution finalized");
        self.complete(builder.finish(terminal));
        Ok(())
    }

    fn complete(&mut self, descriptor: ResponseDescriptor) {
        if let Some(completer) = self.completer.take() {
            if completer.send(descriptor).is_err() {
                tracing::debug!(execution = %self.execution, "completion receiver already gone");
            }
        }
    }
}

impl ResponseSink for OutputInterceptor {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn set_status(&mut self, code: u16) -> Result<(), SinkError> {
        self.recording()?;
        self.record_status(code);
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        self.recording()?.header(name, value);
        Ok(())
    }

    fn send(&mut self, body: Body) -> Result<(), SinkError> {
        self.finish(Terminal::Body { body })
    }

    fn redirect(&mut self, redirect: Redirect) -> Result<(), SinkError> {
        self.finish(Terminal::Redirect { redirect })
    }

    fn end(&mut self, raw: Vec<u8>) -> Result<(), SinkError> {
        self.finish(Terminal::Raw { bytes: raw })
    }
}

impl Drop for OutputInterceptor {
    fn drop(&mut self) {
        if let Some(builder) = self.builder.take() {
            tracing::debug!(execution = %self.execution, "interceptor released without a terminal call");
            self.complete(builder.finish_unterminated());
        }
    }
}
