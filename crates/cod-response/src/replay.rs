//! Replay Driver
//!
//! Applies a finished [`ResponseDescriptor`] onto a live sink: status,
//! then every header in the order the execution wrote it, then the one
//! terminal action it carries.

use crate::descriptor::{ResponseDescriptor, Terminal};
use crate::error::{ReplayError, TERMINAL_CONTRACT};
use crate::sink::ResponseSink;

/// Replays captured responses onto sinks
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayDriver;

impl ReplayDriver {
    /// Create new replay driver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Replay `descriptor` onto `sink`
    ///
    /// A descriptor without terminal output is refused before anything is
    /// written, so the sink stays untouched and the caller can answer it
    /// with an error response of its own.
    ///
    /// # Errors
    /// - `ReplayError::MissingTerminal` if no terminal call was captured
    /// - `ReplayError::Sink` if the sink rejects a write
    pub fn replay<S>(&self, descriptor: &ResponseDescriptor, sink: &mut S) -> Result<(), ReplayError>
    where
        S: ResponseSink + ?Sized,
    {
        let Some(terminal) = descriptor.terminal() else {
            tracing::error!(
                status = ?descriptor.status_code(),
                headers = descriptor.headers().len(),
                contract = TERMINAL_CONTRACT,
                "cannot replay a response that never ended"
            );
            return Err(ReplayError::MissingTerminal);
        };

        if let Some(code) = descriptor.status_code() {
            sink.set_status(code)?;
        }
        for (name, value) in descriptor.headers() {
            sink.set_header(name, value)?;
        }

        match terminal {
            Terminal::Redirect { redirect } => sink.redirect(redirect.clone())?,
            Terminal::Body { body } => sink.send(body.clone())?,
            Terminal::Raw { bytes } => sink.end(bytes.clone())?,
        }
        Ok(())
    }
}

/// Replay `descriptor` onto `sink` with the default driver
///
/// # Errors
/// See [`ReplayDriver::replay`]
pub fn replay<S>(descriptor: &ResponseDescriptor, sink: &mut S) -> Result<(), ReplayError>
where
    S: ResponseSink + ?Sized,
{
    ReplayDriver::new().replay(descriptor, sink)
}
